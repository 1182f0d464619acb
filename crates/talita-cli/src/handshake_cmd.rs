//! Handshake subcommands: show, payload, accept, pair.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use talita_core::Config;
use talita_handshake::{
    CodeScanner, ContactStore, Geometry, Handshake, KeyGenerator, TrustedContact,
    fingerprint_randomart,
};

use crate::contacts_cmd::open_store;
use crate::render::{SvgRenderer, TerminalRenderer};
use crate::scan::{FileScanner, LineScanner};

/// Options for showing this device's code.
#[derive(clap::Args, Debug, Default)]
pub struct ShowArgs {
    /// Write the code as an SVG file instead of drawing it in the terminal.
    #[arg(long)]
    pub svg: Option<PathBuf>,
    /// Edge length of the SVG in pixels (defaults to `code.size_px`).
    #[arg(long, requires = "svg")]
    pub size: Option<u32>,
}

/// Where to read a peer's payload from.
#[derive(clap::Args, Debug, Default)]
pub struct AcceptArgs {
    /// Payload text. Read from stdin when neither this nor --file is given.
    pub payload: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with = "payload")]
    pub file: Option<PathBuf>,
    /// Name to store the contact under.
    #[arg(long)]
    pub label: Option<String>,
}

/// Show our code, then read the peer's.
#[derive(clap::Args, Debug)]
pub struct PairArgs {
    /// Name to store the peer under.
    #[arg(long)]
    pub label: String,
}

/// Draw this device's code with its payload and fingerprint.
pub fn show(args: &ShowArgs, config: &Config) -> anyhow::Result<()> {
    let handshake = Handshake::new(config);
    let size = args.size.unwrap_or(config.code.size_px);
    show_own_code(&handshake, config, args.svg.as_deref(), size, &mut io::stdout())
}

/// Print only the payload text, for piping into another tool.
pub fn payload(config: &Config) -> anyhow::Result<()> {
    let handshake = Handshake::new(config);
    let encoded = handshake.prepare_outgoing()?;
    writeln!(io::stdout(), "{encoded}")?;
    Ok(())
}

/// Accept a peer's payload and store it.
pub fn accept(args: AcceptArgs, config: &Config) -> anyhow::Result<()> {
    let text = match (args.payload, args.file) {
        (Some(text), _) => text,
        (None, Some(path)) => FileScanner::new(path).scan().into_text()?,
        (None, None) => LineScanner::stdin().scan().into_text()?,
    };
    let handshake = Handshake::new(config);
    let mut store = open_store(config)?;
    let contact =
        handshake.accept_and_persist(&text, args.label.as_deref(), &mut store)?;
    print_contact(&contact, &mut io::stdout())
}

/// One session on this device: show our code, then accept the peer's from
/// stdin using the same keypair.
pub fn pair(args: &PairArgs, config: &Config) -> anyhow::Result<()> {
    let handshake = Handshake::new(config);
    let mut store = open_store(config)?;
    let mut out = io::stdout();
    show_own_code(&handshake, config, None, config.code.size_px, &mut out)?;
    writeln!(out)?;
    writeln!(out, "Paste the payload shown by the other device:")?;
    out.flush()?;
    let contact = accept_from(
        &handshake,
        &mut LineScanner::stdin(),
        Some(&args.label),
        &mut store,
    )?;
    print_contact(&contact, &mut out)
}

fn show_own_code<G: KeyGenerator>(
    handshake: &Handshake<G>,
    config: &Config,
    svg: Option<&Path>,
    size: u32,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let level = config.code.error_correction;
    match svg {
        Some(path) => {
            let document =
                handshake.render_outgoing(&SvgRenderer { level }, Geometry::square(size))?;
            std::fs::write(path, document)?;
            writeln!(out, "Wrote QR code to {}", path.display())?;
        }
        None => {
            let code =
                handshake.render_outgoing(&TerminalRenderer { level }, Geometry::square(size))?;
            writeln!(out, "{code}")?;
        }
    }

    let encoded = handshake.prepare_outgoing()?;
    let fingerprint = handshake.local_fingerprint()?;
    writeln!(out, "Payload:")?;
    writeln!(out, "{encoded}")?;
    writeln!(out)?;
    writeln!(out, "Fingerprint:")?;
    writeln!(out, "{}", fingerprint.grouped())?;
    writeln!(out, "{}", fingerprint_randomart(&fingerprint, "This device"))?;
    Ok(())
}

fn accept_from<G: KeyGenerator>(
    handshake: &Handshake<G>,
    scanner: &mut impl CodeScanner,
    label: Option<&str>,
    store: &mut impl ContactStore,
) -> anyhow::Result<TrustedContact> {
    let text = scanner.scan().into_text()?;
    Ok(handshake.accept_and_persist(&text, label, store)?)
}

fn print_contact(contact: &TrustedContact, out: &mut impl Write) -> anyhow::Result<()> {
    let title = contact.label().unwrap_or("Peer");
    writeln!(out, "Accepted {} key", contact.public_key().algorithm())?;
    writeln!(out, "Fingerprint:")?;
    writeln!(out, "{}", contact.fingerprint().grouped())?;
    writeln!(out, "{}", fingerprint_randomart(contact.fingerprint(), title))?;
    writeln!(out, "Compare this fingerprint with the other device before trusting it.")?;
    Ok(())
}
