use std::borrow::Cow;

const BLANK_LINE: &str = "\n\n";

/// Make one streamed delta safe to print.
///
/// Some providers open an answer with a chunk that is nothing but a blank
/// line. A chunk that is exactly `"\n\n"` is dropped the first time it is
/// seen in a turn and shrunk to a single newline afterwards. Every other chunk
/// is returned untouched.
pub fn normalize_output<'a>(chunk: &'a str, first_shown: &mut bool) -> Cow<'a, str> {
    if chunk != BLANK_LINE {
        return Cow::Borrowed(chunk);
    }
    if !*first_shown {
        *first_shown = true;
        Cow::Borrowed("")
    } else {
        Cow::Borrowed("\n")
    }
}
