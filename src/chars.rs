//! Byte classification tables for HTTP field parsing.
//!
//! Three distinct alphabets are in play and they must not be conflated:
//! token characters (methods, header names), visible characters
//! (start-lines, which additionally allow the space separator at the call
//! site), and header-value characters (VCHAR plus SP and HTAB, since field
//! values may carry interior whitespace that start-lines may not).

/// RFC 7230 `tchar`: alphanumerics plus `!#$%&'*+-.^_`|~`.
pub(crate) static TOKEN_CHARS: [bool; 256] = build_token_table();

/// RFC 5234 `VCHAR`: printable US-ASCII, 0x21..=0x7e.
pub(crate) static VISIBLE_CHARS: [bool; 256] = build_visible_table();

/// Characters allowed inside a header field value: VCHAR, SP and HTAB.
pub(crate) static FIELD_VALUE_CHARS: [bool; 256] = build_field_value_table();

const fn build_token_table() -> [bool; 256] {
    let mut table = [false; 256];
    let mut b = 0usize;
    while b < 256 {
        let c = b as u8;
        table[b] = c.is_ascii_alphanumeric()
            || matches!(
                c,
                b'!' | b'#'
                    | b'$'
                    | b'%'
                    | b'&'
                    | b'\''
                    | b'*'
                    | b'+'
                    | b'-'
                    | b'.'
                    | b'^'
                    | b'_'
                    | b'`'
                    | b'|'
                    | b'~'
            );
        b += 1;
    }
    table
}

const fn build_visible_table() -> [bool; 256] {
    let mut table = [false; 256];
    let mut b = 0x21usize;
    while b <= 0x7e {
        table[b] = true;
        b += 1;
    }
    table
}

const fn build_field_value_table() -> [bool; 256] {
    let mut table = build_visible_table();
    table[b' ' as usize] = true;
    table[b'\t' as usize] = true;
    table
}

/// Index of the first byte not allowed by `table`, if any.
///
/// Error reporting depends on this being the *first* offender, so the scan
/// is strictly left to right.
pub(crate) fn index_of_first_invalid(bytes: &[u8], table: &[bool; 256]) -> Option<usize> {
    bytes.iter().position(|&b| !table[b as usize])
}
