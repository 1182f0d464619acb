//! Visual fingerprint representation for verification.
//!
//! Renders a fingerprint as an OpenSSH-style "randomart" box so two people
//! holding their devices side by side can compare keys at a glance before
//! reading out the hex.

use crate::fingerprint::Fingerprint;

/// Inner width of the box.
const WIDTH: usize = 17;
/// Inner height of the box.
const HEIGHT: usize = 9;

/// Cell symbols by visit count. The last two are the start and end markers.
const SYMBOLS: &[u8] = b" .o+=*BOX@%&#/^SE";

#[allow(clippy::cast_possible_truncation)] // SYMBOLS.len() == 17
const START: u8 = SYMBOLS.len() as u8 - 2;
#[allow(clippy::cast_possible_truncation)]
const END: u8 = SYMBOLS.len() as u8 - 1;

/// Render `fingerprint` as a bordered randomart box with `title` centred in
/// the top border.
///
/// The bishop starts in the centre and takes four diagonal steps per digest
/// byte, low bits first, clamped at the walls.
pub fn fingerprint_randomart(fingerprint: &Fingerprint, title: &str) -> String {
    let mut field = [[0u8; WIDTH]; HEIGHT];
    let (mut x, mut y) = (WIDTH / 2, HEIGHT / 2);

    for byte in fingerprint.digest() {
        let mut bits = *byte;
        for _ in 0..4 {
            x = if bits & 0x01 == 0 {
                x.saturating_sub(1)
            } else {
                (x + 1).min(WIDTH - 1)
            };
            y = if bits & 0x02 == 0 {
                y.saturating_sub(1)
            } else {
                (y + 1).min(HEIGHT - 1)
            };
            if field[y][x] < START - 1 {
                field[y][x] += 1;
            }
            bits >>= 2;
        }
    }

    field[HEIGHT / 2][WIDTH / 2] = START;
    field[y][x] = END;

    let title: String = title.chars().take(WIDTH).collect();
    let title_len = title.chars().count();
    let left = (WIDTH - title_len) / 2;
    let right = WIDTH - title_len - left;

    let mut lines = Vec::with_capacity(HEIGHT + 2);
    lines.push(format!("+{}{title}{}+", "-".repeat(left), "-".repeat(right)));
    for row in &field {
        let cells: String = row
            .iter()
            .map(|&cell| char::from(SYMBOLS[usize::from(cell)]))
            .collect();
        lines.push(format!("|{cells}|"));
    }
    lines.push(format!("+{}+", "-".repeat(WIDTH)));
    lines.join("\n")
}

/// Side-by-side randomart of two fingerprints and whether they match.
pub fn compare_fingerprints(
    local: &Fingerprint,
    local_label: &str,
    remote: &Fingerprint,
    remote_label: &str,
) -> (String, bool) {
    let matches = local.matches(remote);
    let local_art = fingerprint_randomart(local, local_label);
    let remote_art = fingerprint_randomart(remote, remote_label);

    let mut output: String = local_art
        .lines()
        .zip(remote_art.lines())
        .map(|(left, right)| format!("{left}  {right}\n"))
        .collect();
    if matches {
        output.push_str("\nFingerprints MATCH");
    } else {
        output.push_str("\nFingerprints DO NOT MATCH - do not trust this key!");
    }
    (output, matches)
}
