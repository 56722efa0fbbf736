use askama::Result;

// Turns a role slug such as `service-provider` into `Service Provider`.
// Used as `|role_label` in the templates.
#[allow(clippy::unnecessary_wraps)]
pub fn role_label<T: std::fmt::Display>(slug: T) -> Result<String> {
    let label = slug
        .to_string()
        .split(|c| c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Ok(label)
}
