// Greedy word wrap with per-line centering.
//
// Coordinates follow genpdf: millimetres, y growing downward from the top
// edge of the page.

/// Font selection for measuring and drawing a run of text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontSpec {
    pub bold: bool,
    pub size: u8,
}

impl FontSpec {
    pub const fn regular(size: u8) -> Self {
        Self { bold: false, size }
    }

    pub const fn bold(size: u8) -> Self {
        Self { bold: true, size }
    }
}

pub trait TextMeasure {
    /// Rendered width of `text` in millimetres.
    fn width(&self, text: &str, font: FontSpec) -> f64;
}

impl<F> TextMeasure for F
where
    F: Fn(&str, FontSpec) -> f64,
{
    fn width(&self, text: &str, font: FontSpec) -> f64 {
        self(text, font)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WrappedLine {
    pub text: String,
    /// Left edge that centers this line on the requested x.
    pub x: f64,
    /// Distance below the first line.
    pub offset: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct WrapBox {
    pub max_width: f64,
    pub top: f64,
    pub line_height: f64,
    pub center_x: f64,
}

/// Breaks `text` into lines no wider than `max_width`, each centered on
/// `center_x`.
///
/// Fit is tested on the tentative line including its trailing space. A word
/// that is wider than the box on its own still gets a line to itself: words
/// are never hyphenated or split.
pub fn wrap_centered<M: TextMeasure + ?Sized>(
    text: &str,
    measure: &M,
    font: FontSpec,
    bounds: WrapBox,
) -> Vec<WrappedLine> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut offset = 0.0;

    let emit = |line: &str, offset: f64, lines: &mut Vec<WrappedLine>| {
        let text = line.trim_end().to_string();
        let width = measure.width(&text, font);
        lines.push(WrappedLine {
            x: bounds.center_x - width / 2.0,
            offset,
            y: bounds.top + offset,
            text,
        });
    };

    for word in text.split_whitespace() {
        let tentative = format!("{current}{word} ");
        if current.is_empty() || measure.width(&tentative, font) <= bounds.max_width {
            current = tentative;
        } else {
            emit(&current, offset, &mut lines);
            current = format!("{word} ");
            offset += bounds.line_height;
        }
    }

    if !current.is_empty() {
        emit(&current, offset, &mut lines);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    // One millimetre per character regardless of font.
    fn mono(text: &str, _font: FontSpec) -> f64 {
        text.chars().count() as f64
    }

    fn bounds(max_width: f64) -> WrapBox {
        WrapBox {
            max_width,
            top: 100.0,
            line_height: 8.0,
            center_x: 50.0,
        }
    }

    #[test]
    fn two_words_per_line() {
        // "a b " is 4 wide, "a b c " is 6.
        let lines = wrap_centered("a b c d", &mono, FontSpec::regular(12), bounds(4.0));

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "a b");
        assert_eq!(lines[1].text, "c d");
        assert_eq!(lines[0].offset, 0.0);
        assert_eq!(lines[1].offset, 8.0);
        assert_eq!(lines[0].y, 100.0);
        assert_eq!(lines[1].y, 108.0);
        assert_eq!(lines[0].x, 50.0 - 1.5);
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(wrap_centered("", &mono, FontSpec::regular(12), bounds(10.0)).is_empty());
        assert!(wrap_centered("   \n\t ", &mono, FontSpec::regular(12), bounds(10.0)).is_empty());
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let lines = wrap_centered(
            "incomprehensibilities",
            &mono,
            FontSpec::regular(12),
            bounds(5.0),
        );

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "incomprehensibilities");
        assert_eq!(lines[0].offset, 0.0);
    }

    #[test]
    fn oversized_word_between_short_words() {
        let lines = wrap_centered("ab enormous cd", &mono, FontSpec::regular(12), bounds(5.0));
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["ab", "enormous", "cd"]);
        assert_eq!(lines[2].offset, 16.0);
    }

    #[test]
    fn lines_are_centered_individually() {
        let lines = wrap_centered("aaaa b", &mono, FontSpec::regular(12), bounds(5.0));

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].x, 48.0);
        assert_eq!(lines[1].x, 49.5);
    }

    #[test]
    fn measure_sees_requested_font() {
        let wide_when_bold = |text: &str, font: FontSpec| {
            let per_char = if font.bold { 2.0 } else { 1.0 };
            text.chars().count() as f64 * per_char
        };

        let regular = wrap_centered("a b c d", &wide_when_bold, FontSpec::regular(12), bounds(8.0));
        let bold = wrap_centered("a b c d", &wide_when_bold, FontSpec::bold(12), bounds(8.0));
        assert_eq!(regular.len(), 1);
        assert_eq!(bold.len(), 2);
    }
}
