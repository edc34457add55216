//! Naming helpers shared by the render model, the toolchains and the smoke tester

/// Converts a string to snake_case.
///
/// Handles camelCase, PascalCase, kebab-case and space-separated input. Runs of
/// capitals are kept together, so `HTTPResponse` becomes `httpresponse`.
///
/// # Examples
/// ```
/// use servicegen::core::utils::to_snake_case;
///
/// assert_eq!(to_snake_case("PaidAt"), "paid_at");
/// assert_eq!(to_snake_case("invoice-line"), "invoice_line");
/// ```
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_is_lowercase = false;

    for ch in s.chars() {
        if ch.is_uppercase() {
            if prev_is_lowercase {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
            prev_is_lowercase = false;
        } else if ch.is_alphanumeric() {
            result.push(ch);
            prev_is_lowercase = ch.is_lowercase() || ch.is_ascii_digit();
        } else if matches!(ch, '-' | '_' | ' ') {
            if !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
            prev_is_lowercase = false;
        }
    }

    result.trim_matches('_').to_string()
}

/// Converts a string to kebab-case, used for HTTP routes.
///
/// ```
/// use servicegen::core::utils::to_kebab_case;
///
/// assert_eq!(to_kebab_case("InvoiceLines"), "invoice-lines");
/// ```
pub fn to_kebab_case(s: &str) -> String {
    to_snake_case(s).replace('_', "-")
}

/// Lower-cases the first character only (`PaidAt` -> `paidAt`).
pub fn to_camel_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
    }
}

/// Explicit plural when given, otherwise the name with an `s` appended.
pub fn plural_name(name: &str, explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|p| !p.is_empty()) {
        Some(plural) => plural.to_string(),
        None if name.trim().is_empty() => name.to_string(),
        None => format!("{name}s"),
    }
}

/// Database name used by a generated service's compose file.
pub fn database_name(service_name: &str) -> String {
    format!("{}_db", service_name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("paidAt"), "paid_at");
        assert_eq!(to_snake_case("InvoiceService"), "invoice_service");
        assert_eq!(to_snake_case("invoice-line"), "invoice_line");
        assert_eq!(to_snake_case("invoice_line"), "invoice_line");
        assert_eq!(to_snake_case("HTTPResponse"), "httpresponse");
        assert_eq!(to_snake_case("line2Total"), "line2_total");
        assert_eq!(to_snake_case("get HTTP Response"), "get_http_response");
    }

    #[test]
    fn test_to_kebab_case() {
        assert_eq!(to_kebab_case("Invoices"), "invoices");
        assert_eq!(to_kebab_case("InvoiceLines"), "invoice-lines");
    }

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("PaidAt"), "paidAt");
        assert_eq!(to_camel_case(""), "");
    }

    #[test]
    fn test_plural_name() {
        assert_eq!(plural_name("Invoice", None), "Invoices");
        assert_eq!(plural_name("Person", Some("People")), "People");
        assert_eq!(plural_name("Person", Some("  ")), "Persons");
        assert_eq!(plural_name("", None), "");
    }

    #[test]
    fn test_database_name() {
        assert_eq!(database_name("InvoiceService"), "invoiceservice_db");
    }
}
