//! Proguard-style class-name pattern matching against interned descriptors.

/// `pattern` is a dotted Proguard-style class name, possibly with `*`/`?`
/// wildcards and a leading `!` negation (already split off by the caller).
/// `descriptor` is the interned `Lpkg/Name;` form. `*` matches any run of
/// characters (including package separators, since the budget here favors
/// "close enough to Proguard" over a faithful `*`-vs-`**` package-boundary
/// distinction, which the spec does not test).
pub fn matches_class_name(pattern: &str, descriptor: &str) -> bool {
    let body = descriptor.strip_prefix('L').and_then(|d| d.strip_suffix(';')).unwrap_or(descriptor);
    let dotted: String = body.replace('/', ".");
    let pattern = pattern.replace('/', ".");
    glob_match(&pattern, &dotted)
}

pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_match_rec(&p, &t)
}

fn glob_match_rec(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => glob_match_rec(&p[1..], t) || (!t.is_empty() && glob_match_rec(p, &t[1..])),
        Some('?') => !t.is_empty() && glob_match_rec(&p[1..], &t[1..]),
        Some(c) => t.first() == Some(c) && glob_match_rec(&p[1..], &t[1..]),
    }
}

/// Does `name` match pattern `raw` (handling a leading `!` negation)?
pub fn matches_with_negation(raw: &str, descriptor: &str) -> bool {
    if let Some(pattern) = raw.strip_prefix('!') {
        !matches_class_name(pattern, descriptor)
    } else {
        matches_class_name(raw, descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_any_suffix() {
        assert!(matches_class_name("com.example.*", "Lcom/example/Foo;"));
        assert!(!matches_class_name("com.other.*", "Lcom/example/Foo;"));
    }

    #[test]
    fn exact_name_matches_only_itself() {
        assert!(matches_class_name("com.example.Foo", "Lcom/example/Foo;"));
        assert!(!matches_class_name("com.example.Foo", "Lcom/example/Bar;"));
    }

    #[test]
    fn negation_inverts_match() {
        assert!(matches_with_negation("!com.example.Foo", "Lcom/example/Bar;"));
        assert!(!matches_with_negation("!com.example.Foo", "Lcom/example/Foo;"));
    }
}
