// src/utils/sanitize.rs

/// Whitelist-based HTML cleaning for admin-authored free text
/// (package descriptions, question explanations).
///
/// Safe tags such as `<b>` and `<p>` survive; `<script>` is dropped along with
/// its content. Options and correct answers never go through here, since
/// scoring compares them byte for byte.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Cleans optional text, collapsing blank values to `None`.
pub fn clean_optional(input: Option<String>) -> Option<String> {
    input
        .map(|text| clean_html(text.trim()))
        .filter(|text| !text.is_empty())
}
