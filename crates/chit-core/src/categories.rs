//! Canonical expense categories and fuzzy alias lookup
//!
//! The classifier prompts the LLM with this closed set, and the query tools
//! normalize free-text user terms against the alias table before filtering.

/// The closed set of expense categories
pub const CATEGORIES: [&str; 10] = [
    "Food & Beverage",
    "Groceries",
    "Transport",
    "Shopping",
    "Utilities",
    "Entertainment",
    "Health & Pharmacy",
    "Electronics",
    "Automotive",
    "Other",
];

/// Category used when classification fails entirely
pub const FALLBACK_CATEGORY: &str = "Other";

/// Alias fragments mapped to canonical categories.
///
/// Matching is substring-based over the lowercased, trimmed input so that
/// "grocery store" and "Grocery" both land on "Groceries". Order matters:
/// the first matching fragment wins.
const CATEGORY_ALIASES: &[(&str, &str)] = &[
    ("food", "Food & Beverage"),
    ("restaurant", "Food & Beverage"),
    ("dining", "Food & Beverage"),
    ("coffee", "Food & Beverage"),
    ("cafe", "Food & Beverage"),
    ("grocery", "Groceries"),
    ("supermarket", "Groceries"),
    ("transport", "Transport"),
    ("travel", "Transport"),
    ("uber", "Transport"),
    ("lyft", "Transport"),
    ("gas", "Transport"),
    ("fuel", "Transport"),
    ("shop", "Shopping"),
    ("retail", "Shopping"),
    ("utility", "Utilities"),
    ("bills", "Utilities"),
    ("fun", "Entertainment"),
    ("movies", "Entertainment"),
    ("games", "Entertainment"),
    ("health", "Health & Pharmacy"),
    ("pharmacy", "Health & Pharmacy"),
    ("medical", "Health & Pharmacy"),
    ("medicine", "Health & Pharmacy"),
    ("tech", "Electronics"),
    ("gadgets", "Electronics"),
    ("auto", "Automotive"),
    ("car", "Automotive"),
];

/// Normalize a user-supplied category term to a canonical category.
///
/// Trims and lowercases the input, then scans the alias table for a fragment
/// contained in it. Unmatched input is returned trimmed, so exact canonical
/// names (and anything else) still work with the LIKE filters downstream.
pub fn normalize_category(term: &str) -> String {
    let normalized = term.trim().to_lowercase();
    for (alias, category) in CATEGORY_ALIASES {
        if normalized.contains(alias) {
            return (*category).to_string();
        }
    }
    term.trim().to_string()
}

/// Format the category list for inclusion in an LLM prompt
pub fn categories_for_prompt() -> String {
    CATEGORIES.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_exact_alias() {
        assert_eq!(normalize_category("grocery"), "Groceries");
        assert_eq!(normalize_category("pharmacy"), "Health & Pharmacy");
        assert_eq!(normalize_category("uber"), "Transport");
    }

    #[test]
    fn test_normalize_case_insensitive() {
        assert_eq!(normalize_category("FOOD"), "Food & Beverage");
        assert_eq!(normalize_category("Food"), "Food & Beverage");
        assert_eq!(normalize_category("food"), "Food & Beverage");
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(normalize_category("  Food  "), "Food & Beverage");
        assert_eq!(normalize_category("\tgas\n"), "Transport");
    }

    #[test]
    fn test_normalize_substring_match() {
        assert_eq!(normalize_category("grocery store"), "Groceries");
        assert_eq!(normalize_category("my coffee runs"), "Food & Beverage");
    }

    #[test]
    fn test_normalize_passthrough() {
        // Canonical names without an alias fragment pass through trimmed
        assert_eq!(normalize_category(" Electronics "), "Electronics");
        assert_eq!(normalize_category("Quantum Widgets"), "Quantum Widgets");
    }

    #[test]
    fn test_equivalent_inputs_identical() {
        let a = normalize_category("  Food  ");
        let b = normalize_category("food");
        let c = normalize_category("FOOD");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_categories_for_prompt_contains_all() {
        let joined = categories_for_prompt();
        for category in CATEGORIES {
            assert!(joined.contains(category));
        }
    }
}
