//! Markdown to plain text for indexing

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Render markdown as plain text: markup dropped, block structure kept as
/// blank-line separated paragraphs
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);

    for event in parser {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item) => out.push_str("- "),
            Event::End(TagEnd::Heading(_)) => {
                // headings become their own sentence
                if !out.ends_with(['.', '?', '!', ':']) {
                    out.push('.');
                }
                out.push_str("\n\n");
            }
            Event::End(TagEnd::Paragraph | TagEnd::CodeBlock | TagEnd::Table) => out.push_str("\n\n"),
            Event::End(TagEnd::Item | TagEnd::TableRow | TagEnd::TableHead) => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push_str(" | "),
            _ => {}
        }
    }

    collapse_blank_lines(&out)
}

fn collapse_blank_lines(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 && !result.is_empty() {
                result.push('\n');
            }
            continue;
        }
        blank_run = 0;
        result.push_str(line);
        result.push('\n');
    }
    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markup() {
        let md = "# Events\n\nThe **robotics** night is on *Friday*.\nSee [Instagram](https://instagram.com).\n\n- Arduino\n- `ROS`\n";
        let text = markdown_to_text(md);
        assert_eq!(
            text,
            "Events.\n\nThe robotics night is on Friday. See Instagram.\n\n- Arduino\n- ROS"
        );
    }

    #[test]
    fn test_heading_punctuation_kept() {
        assert_eq!(markdown_to_text("## How to join?\nFill the form."), "How to join?\n\nFill the form.");
    }

    #[test]
    fn test_empty() {
        assert_eq!(markdown_to_text(""), "");
    }
}
