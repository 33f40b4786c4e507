use super::session::Flash;
use crate::models::GenerationResult;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, flashes: &[Flash], body: &str) -> String {
    let flashes: String = flashes
        .iter()
        .map(|f| {
            format!(
                "<div class=\"flash flash-{}\">{}</div>\n",
                f.category.as_str(),
                escape_html(&f.message)
            )
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n<h1>AI Image Generator</h1>\n{}{}\n</body>\n</html>\n",
        escape_html(title),
        flashes,
        body
    )
}

pub fn index(flashes: &[Flash]) -> String {
    layout(
        "Generate an image",
        flashes,
        "<form method=\"post\" action=\"/\">\n\
         <label for=\"prompt\">Describe the image</label>\n\
         <textarea id=\"prompt\" name=\"prompt\" rows=\"4\" minlength=\"5\" required></textarea>\n\
         <button type=\"submit\">Generate</button>\n</form>",
    )
}

pub fn result(result: &GenerationResult) -> String {
    let body = format!(
        "<p class=\"prompt\">{}</p>\n<img src=\"{}\" alt=\"{}\">\n<p><a href=\"/\">Generate another</a></p>",
        escape_html(&result.prompt),
        escape_html(&result.url),
        escape_html(&result.prompt)
    );
    layout("Your image", &[], &body)
}

pub fn error(message: &str) -> String {
    let body = format!(
        "<p class=\"error\">{}</p>\n<p><a href=\"/\">Back</a></p>",
        escape_html(message)
    );
    layout("Error", &[], &body)
}
