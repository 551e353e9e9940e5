/// Small builder for dynamically-assembled INSERT/UPDATE statements.
///
/// Owns the field/placeholder/value invariants the storage adapter relies
/// on: every field gets exactly one placeholder, and raw `NOW()` markers
/// must go through `raw_field` so they are never bound as values.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    fields: Vec<String>,
    placeholders: Vec<String>,
    raw_fields: Vec<(String, String)>,
    next_index: usize,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            placeholders: Vec::new(),
            raw_fields: Vec::new(),
            next_index: 1,
        }
    }

    /// Add a bound field. Panics if the caller tries to smuggle a SQL
    /// function through the bound-value path.
    pub fn field(&mut self, name: &str) -> &mut Self {
        assert!(
            !name.to_uppercase().contains("NOW()"),
            "NOW() must use raw_field, not a bound value"
        );
        self.fields.push(name.to_string());
        self.placeholders.push(format!("${}", self.next_index));
        self.next_index += 1;
        self
    }

    /// Add a field set to a raw SQL expression (e.g. `NOW()`).
    pub fn raw_field(&mut self, name: &str, expression: &str) -> &mut Self {
        self.raw_fields.push((name.to_string(), expression.to_string()));
        self
    }

    /// Number of bound placeholders so far; callers must bind exactly this
    /// many values, in order.
    pub fn bound_count(&self) -> usize {
        self.placeholders.len()
    }

    /// `INSERT INTO table (...) VALUES (...)` with raw fields appended.
    pub fn insert_sql(&self, table: &str) -> String {
        assert_eq!(
            self.fields.len(),
            self.placeholders.len(),
            "field/placeholder count mismatch"
        );
        let mut names: Vec<&str> = self.fields.iter().map(String::as_str).collect();
        let mut values: Vec<&str> = self.placeholders.iter().map(String::as_str).collect();
        for (name, expression) in &self.raw_fields {
            names.push(name);
            values.push(expression);
        }
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            values.join(", ")
        )
    }

    /// `UPDATE table SET ... WHERE <condition>` where the condition's
    /// placeholder indexes continue after the bound fields.
    pub fn update_sql(&self, table: &str, condition: &str) -> String {
        assert_eq!(
            self.fields.len(),
            self.placeholders.len(),
            "field/placeholder count mismatch"
        );
        let mut assignments: Vec<String> = self
            .fields
            .iter()
            .zip(&self.placeholders)
            .map(|(f, p)| format!("{f} = {p}"))
            .collect();
        for (name, expression) in &self.raw_fields {
            assignments.push(format!("{name} = {expression}"));
        }
        format!("UPDATE {table} SET {} WHERE {condition}", assignments.join(", "))
    }

    /// Placeholder for a condition appended after the bound fields.
    pub fn next_placeholder(&mut self) -> String {
        let placeholder = format!("${}", self.next_index);
        self.next_index += 1;
        placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql_shape() {
        let mut qb = QueryBuilder::new();
        qb.field("title").field("apply_url").raw_field("last_seen_at", "NOW()");
        assert_eq!(
            qb.insert_sql("jobs"),
            "INSERT INTO jobs (title, apply_url, last_seen_at) VALUES ($1, $2, NOW())"
        );
        assert_eq!(qb.bound_count(), 2);
    }

    #[test]
    fn update_sql_continues_placeholder_numbering() {
        let mut qb = QueryBuilder::new();
        qb.field("title").field("location_raw").raw_field("updated_at", "NOW()");
        let condition = format!("canonical_hash = {}", qb.next_placeholder());
        assert_eq!(
            qb.update_sql("jobs", &condition),
            "UPDATE jobs SET title = $1, location_raw = $2, updated_at = NOW() WHERE canonical_hash = $3"
        );
    }

    #[test]
    #[should_panic(expected = "NOW() must use raw_field")]
    fn now_in_bound_field_panics() {
        QueryBuilder::new().field("updated_at = NOW()");
    }
}
