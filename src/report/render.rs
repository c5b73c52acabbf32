use super::{Block, Report};

pub fn render_markdown(report: &Report) -> String {
    let mut out = format!("## {}\n", report.title);
    for section in &report.sections {
        out.push('\n');
        if let Some(heading) = &section.heading {
            out.push_str(&format!("### {heading}\n"));
        }
        for block in &section.blocks {
            match block {
                Block::Paragraph(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                Block::Bullets(items) => {
                    for item in items {
                        out.push_str(&format!("- {item}\n"));
                    }
                }
                Block::KeyValues(pairs) => {
                    for (key, value) in pairs {
                        out.push_str(&format!("- **{key}:** {value}\n"));
                    }
                }
            }
        }
    }
    out
}

pub fn render_plain(report: &Report) -> String {
    let mut out = format!("{}\n", report.title);
    out.push_str(&"=".repeat(report.title.chars().count()));
    out.push('\n');
    for section in &report.sections {
        out.push('\n');
        if let Some(heading) = &section.heading {
            out.push_str(&format!("{heading}:\n"));
        }
        for block in &section.blocks {
            match block {
                Block::Paragraph(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                Block::Bullets(items) => {
                    for item in items {
                        out.push_str(&format!("• {item}\n"));
                    }
                }
                Block::KeyValues(pairs) => {
                    for (key, value) in pairs {
                        out.push_str(&format!("{key}: {value}\n"));
                    }
                }
            }
        }
    }
    out
}
