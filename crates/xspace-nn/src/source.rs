use miette::{NamedSource, SourceSpan};

/// Span of the 1-based `line` in `src`, without its line terminator.
pub(crate) fn line_span(src: &str, line: usize) -> SourceSpan {
    let mut offset = 0;
    for (idx, text) in src.split_inclusive('\n').enumerate() {
        let content = text.trim_end_matches(['\n', '\r']);
        if idx + 1 == line {
            return (offset, content.len()).into();
        }
        offset += text.len();
    }
    (src.len(), 0).into()
}

pub(crate) fn named(name: &str, src: &str) -> NamedSource<String> {
    NamedSource::new(name, src.to_string())
}

/// Comma-separated fields of a line; blank fields (trailing commas) are dropped.
pub(crate) fn csv_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(str::trim).filter(|f| !f.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_point_at_line_content() {
        let src = "first\nsecond line\r\nthird";
        assert_eq!(line_span(src, 1), SourceSpan::from((0, 5)));
        assert_eq!(line_span(src, 2), SourceSpan::from((6, 11)));
        assert_eq!(line_span(src, 3), SourceSpan::from((19, 5)));
        assert_eq!(line_span(src, 9), SourceSpan::from((24, 0)));
    }

    #[test]
    fn csv_fields_skip_blanks() {
        let fields: Vec<&str> = csv_fields(" 1.0, 2 ,,3,").collect();
        assert_eq!(fields, vec!["1.0", "2", "3"]);
    }
}
