//! Cleanup of streamed assistant text before display.
//!
//! Two passes: reasoning blocks (`<think>…</think>` plus the newlines that
//! follow the closing marker) are cut out, then whatever angle-bracket tags
//! remain are stripped. The result is trimmed and loses any leading
//! newlines.

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

pub fn sanitize(text: &str) -> String {
    let without_reasoning = strip_think_blocks(text);
    let without_tags = strip_tags(&without_reasoning);
    without_tags.trim().trim_start_matches('\n').to_string()
}

/// Removes each `<think>` block closed by the nearest following `</think>`,
/// together with the run of `\n` right after it. An opening marker with no
/// close is left for [`strip_tags`].
pub fn strip_think_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find(THINK_OPEN) {
        let body = &rest[open + THINK_OPEN.len()..];
        let Some(close) = body.find(THINK_CLOSE) else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = body[close + THINK_CLOSE.len()..].trim_start_matches('\n');
    }
    out.push_str(rest);
    out
}

/// Removes every `<` … `>` span. A `<` with no later `>` is kept verbatim.
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(lt) = rest.find('<') {
        let Some(gt) = rest[lt..].find('>') else {
            break;
        };
        out.push_str(&rest[..lt]);
        rest = &rest[lt + gt + 1..];
    }
    out.push_str(rest);
    out
}

/// The part of an in-flight raw stream that is safe to show: anything from
/// an unclosed `<think>` onwards, or from a `<` still waiting for its `>`,
/// is held back until more text arrives.
pub fn settled_prefix(raw: &str) -> &str {
    let mut end = raw.len();

    let mut cursor = 0;
    while let Some(open) = raw[cursor..].find(THINK_OPEN) {
        let open = cursor + open;
        let after = open + THINK_OPEN.len();
        match raw[after..].find(THINK_CLOSE) {
            Some(close) => {
                cursor = after + close + THINK_CLOSE.len();
            }
            None => {
                end = open;
                break;
            }
        }
    }

    let head = &raw[..end];
    let tail_start = head.rfind('>').map(|gt| gt + 1).unwrap_or(0);
    if let Some(lt) = head[tail_start..].find('<') {
        end = tail_start + lt;
    }
    &raw[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_reasoning_then_tags() {
        assert_eq!(
            sanitize("<think>reasoning</think>\n\nHello **world**"),
            "Hello **world**"
        );
        assert_eq!(sanitize("<p>Mars is <b>strong</b></p>"), "Mars is strong");
    }

    #[test]
    fn multiple_blocks_are_matched_lazily() {
        assert_eq!(
            sanitize("A<think>x</think>\nB<think>y</think>C"),
            "ABC"
        );
    }

    #[test]
    fn only_newlines_after_close_are_eaten() {
        assert_eq!(strip_think_blocks("<think>x</think>\n\n  kept"), "  kept");
        assert_eq!(strip_think_blocks("<think>x</think> \nkept"), " \nkept");
    }

    #[test]
    fn unclosed_think_falls_through_to_tag_pass() {
        assert_eq!(sanitize("<think>still reasoning"), "still reasoning");
    }

    #[test]
    fn dangling_angle_bracket_is_kept() {
        assert_eq!(sanitize("if x < 3"), "if x < 3");
        assert_eq!(strip_tags("a<b<c>d"), "ad");
    }

    #[test]
    fn trims_and_drops_leading_newlines() {
        assert_eq!(sanitize("\n\n  \n Namaste \n"), "Namaste");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        let samples = [
            "",
            "plain",
            "<think>a</think>\n\nb",
            "<think>open only",
            "<<a>b>",
            "<a<b>>c",
            "x < y > z",
            "<think><think>n</think>\n</think>\ntail",
            "\n\n<br>\n\nline",
            "  <i></i>\n",
            "</think>stray<think>",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "input: {:?}", sample);
        }
    }

    #[test]
    fn settled_prefix_holds_back_open_markup() {
        assert_eq!(settled_prefix("Hello"), "Hello");
        assert_eq!(settled_prefix("<think>pondering"), "");
        assert_eq!(settled_prefix("<think>a</think>\nHi <b"), "<think>a</think>\nHi ");
        assert_eq!(settled_prefix("Hi <b>there</b>"), "Hi <b>there</b>");
        assert_eq!(settled_prefix("Hi <thi"), "Hi ");
        assert_eq!(settled_prefix("A<think>x</think>B<think>y"), "A<think>x</think>B");
    }
}
