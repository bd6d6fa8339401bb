/// Strip platform HTML down to the plain text the classifier and the reply
/// generator work with. Collapses the blank lines html2text leaves behind.
pub fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 200);

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
