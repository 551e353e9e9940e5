/// Operational/support role families whose SDG labels are suppressed.
pub const OPERATIONAL_ROLES: [&str; 5] = [
    "Finance, Accounting & Audit",
    "HR, Admin & Ops",
    "IT / Digital / Systems",
    "Logistics, Supply Chain & Procurement",
    "Communications & Advocacy",
];

/// MEAL role families requiring top SDG confidence >= 0.85.
pub const MEAL_ROLES: [&str; 3] = [
    "MEAL / Research / Evidence",
    "Monitoring Officer / Field Monitoring",
    "Data & GIS",
];

pub const CANONICAL_IMPACT_DOMAINS: [&str; 32] = [
    "Climate & Environment",
    "Climate Adaptation & Resilience",
    "Disaster Risk Reduction & Preparedness",
    "Natural Resource Management & Biodiversity",
    "Water, Sanitation & Hygiene (WASH)",
    "Food Security & Nutrition",
    "Agriculture & Livelihoods",
    "Public Health & Primary Health Care",
    "Disease Control & Epidemiology",
    "Sexual & Reproductive Health (SRH)",
    "Mental Health & Psychosocial Support (MHPSS)",
    "Education (Access & Quality)",
    "Education in Emergencies",
    "Gender Equality & Women's Empowerment",
    "Child Protection & Early Childhood Development",
    "Gender-Based Violence (GBV) Prevention & Response",
    "Shelter & CCCM",
    "Migration, Refugees & Displacement",
    "Humanitarian Response & Emergency Operations",
    "Peacebuilding, Governance & Rule of Law",
    "Social Protection & Safety Nets",
    "Economic Recovery & Jobs / Livelihoods",
    "Water Resource Management & Irrigation",
    "Urban Resilience & Sustainable Cities",
    "Digital Development & Data for Development",
    "Monitoring, Evaluation, Accountability & Learning (MEAL)",
    "Human Rights & Advocacy",
    "Anti-Corruption & Transparency",
    "Energy Access & Renewable Energy",
    "Disability Inclusion & Accessibility",
    "Indigenous Peoples & Cultural Rights",
    "Innovation & Human-Centred Design",
];

pub const CANONICAL_FUNCTIONAL_ROLES: [&str; 26] = [
    "Program & Field Implementation",
    "Project Management",
    "MEAL / Research / Evidence",
    "Data & GIS",
    "Communications & Advocacy",
    "Grants / Partnerships / Fundraising",
    "Finance, Accounting & Audit",
    "HR, Admin & Ops",
    "Logistics, Supply Chain & Procurement",
    "Technical Specialists",
    "Policy & Advocacy",
    "IT / Digital / Systems",
    "Monitoring Officer / Field Monitoring",
    "Security & Safety",
    "Shelter / NFI / CCCM Specialist",
    "Cash & Voucher Assistance (CVA) Specialist",
    "Livelihoods & Economic Inclusion Specialist",
    "Education Specialist / EiE Specialist",
    "Protection Specialist / Child Protection Specialist",
    "MHPSS Specialist",
    "Nutrition Specialist",
    "Health Technical Advisor",
    "Geographic / Regional Roles",
    "Senior Leadership",
    "Consulting / Short-term Technical Experts",
    "Legal / Compliance / Donor Compliance",
];

pub const CANONICAL_EXPERIENCE_LEVELS: [&str; 6] = [
    "Early / Junior",
    "Officer / Associate",
    "Specialist / Advisor",
    "Manager / Senior Manager",
    "Head of Unit / Director",
    "Expert / Technical Lead",
];

pub fn is_operational_role(role: &str) -> bool {
    OPERATIONAL_ROLES.contains(&role)
}

pub fn is_meal_role(role: &str) -> bool {
    MEAL_ROLES.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_and_meal_sets_disjoint() {
        for role in OPERATIONAL_ROLES {
            assert!(!is_meal_role(role), "{role} in both sets");
        }
    }

    #[test]
    fn all_rule_roles_are_canonical() {
        for role in OPERATIONAL_ROLES.iter().chain(MEAL_ROLES.iter()) {
            assert!(
                CANONICAL_FUNCTIONAL_ROLES.contains(role),
                "{role} missing from canonical set"
            );
        }
    }
}
