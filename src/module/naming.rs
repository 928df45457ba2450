//! Default instance-name derivation.

/// Converts a CamelCase class name to snake_case: insert `_` at every
/// lowercase→uppercase boundary, then lowercase all letters.
///
/// `"FooBarBaz"` → `"foo_bar_baz"`.
#[must_use]
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_lowercase();
        out.extend(c.to_lowercase());
    }
    out
}

/// Derives the name stem used to search for a free default instance name:
/// the class's `def_module_name` if set, else the CamelCase→snake_case
/// conversion of the class's display name.
#[must_use]
pub fn name_stem(def_module_name: Option<&str>, class_name: &str) -> String {
    def_module_name
        .map(str::to_string)
        .unwrap_or_else(|| camel_to_snake(class_name))
}

/// Scans `stem0, stem1, stem2, ...` and returns the first candidate for
/// which `taken` reports `false`.
pub fn first_free_name(stem: &str, mut taken: impl FnMut(&str) -> bool) -> String {
    for i in 0.. {
        let candidate = format!("{stem}{i}");
        if !taken(&candidate) {
            return candidate;
        }
    }
    unreachable!("usize counter exhausted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_to_snake_inserts_at_boundaries() {
        assert_eq!(camel_to_snake("FooBarBaz"), "foo_bar_baz");
        assert_eq!(camel_to_snake("Source"), "source");
        assert_eq!(camel_to_snake("PortOut"), "port_out");
        assert_eq!(camel_to_snake("HTTP"), "http");
    }

    #[test]
    fn first_free_name_skips_taken_candidates() {
        let taken = ["foo_bar_baz0".to_string(), "foo_bar_baz1".to_string()];
        let name = first_free_name("foo_bar_baz", |c| taken.contains(&c.to_string()));
        assert_eq!(name, "foo_bar_baz2");
    }

    #[test]
    fn default_name_sequence_matches_spec_example() {
        let mut used = Vec::new();
        for _ in 0..3 {
            let name = first_free_name("foo_bar_baz", |c| used.contains(&c.to_string()));
            used.push(name);
        }
        assert_eq!(used, vec!["foo_bar_baz0", "foo_bar_baz1", "foo_bar_baz2"]);
    }
}
