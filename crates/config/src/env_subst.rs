/// Replace `${ENV_VAR}` and `${ENV_VAR:-fallback}` placeholders in raw config
/// text before it is parsed.
///
/// Unresolvable variables without a fallback are left as-is.
pub fn substitute_env(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: emit the remainder literally.
            result.push_str(&rest[start..]);
            return result;
        };
        let body = &after[..end];
        result.push_str(&resolve(body));
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve(body: &str) -> String {
    let (name, fallback) = match body.split_once(":-") {
        Some((name, fallback)) => (name, Some(fallback)),
        None => (body, None),
    };
    if name.is_empty() {
        return format!("${{{body}}}");
    }
    match (std::env::var(name), fallback) {
        (Ok(val), None) => val,
        (Ok(val), Some(_)) if !val.is_empty() => val,
        (_, Some(fallback)) => fallback.to_string(),
        (Err(_), None) => format!("${{{body}}}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_var() {
        let path = std::env::var("PATH").unwrap();
        assert_eq!(substitute_env("key=${PATH}"), format!("key={path}"));
        if !path.is_empty() {
            assert_eq!(substitute_env("${PATH:-other}"), path);
        }
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env("${SWITCHYARD_NONEXISTENT_XYZ}"),
            "${SWITCHYARD_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn uses_fallback_for_unknown_var() {
        assert_eq!(
            substitute_env("db = \"${SWITCHYARD_NONEXISTENT_DB:-sqlite://t.db}\""),
            "db = \"sqlite://t.db\""
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_env("a ${OPEN"), "a ${OPEN");
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
