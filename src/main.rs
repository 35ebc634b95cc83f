//! qrscan command line front end
//!
//! Scans image files through the same debounced session a camera screen uses,
//! generates QR images, and manages history, profile, sign-in and mode.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};

use qrscan::builder::{charset_for_label, QRBuilder};
use qrscan::common::{logging, now_ms, Prefs};
use qrscan::reader::{decode_file, image_files};
use qrscan::scanner::{open_action, OpenAction, ScanSession, SessionEvent};
use qrscan::store::{
    decode_photo, relative_time, sign_out, Auth, HistoryStore, Identity, ProfileStore, Stores,
};
use qrscan::{AppMode, Config, ECLevel, RawScanEvent, ScanError};

#[derive(Parser, Debug)]
#[command(name = "qrscan", version, about = "Scan, generate and keep a history of QR codes")]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode QR codes from image files and save them to history
    Scan {
        /// Image files to scan, in order
        paths: Vec<PathBuf>,

        /// Also scan every image under this directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Save again when asked about a code that stays in view
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate a QR image
    Generate {
        text: String,

        /// Output side in pixels
        #[arg(long, default_value_t = qrscan::builder::DEFAULT_SIZE)]
        size: u32,

        /// Quiet zone in modules
        #[arg(long, default_value_t = qrscan::builder::DEFAULT_MARGIN)]
        margin: u32,

        /// Error correction level (L, M, Q, H)
        #[arg(long, default_value = "M")]
        ec_level: ECLevel,

        /// Character set label, e.g. utf-8, iso-8859-1, shift_jis
        #[arg(long, default_value = "utf-8")]
        charset: String,

        /// Write a PNG here instead of printing to the terminal
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show or edit scan history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Show or edit the user profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Sign in as a user
    Login {
        uid: String,

        #[arg(long)]
        email: Option<String>,
    },

    /// Sign out and forget the saved prefs
    Logout,

    /// Switch between online and offline storage
    Mode { mode: ModeArg },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List scans, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what opening a scan does
    Open { id: String },
    /// Delete one scan
    Delete { id: String },
    /// Delete all scans
    Clear,
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    Show,
    Update {
        #[arg(long)]
        name: String,

        /// New profile photo
        #[arg(long)]
        photo: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Online,
    Offline,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose.then_some("qrscan=debug"));

    let config = Config::load().context("Failed to load configuration")?;
    debug!(?config, "Loaded configuration");

    let prefs = Prefs::load(&config.data_dir).unwrap_or_else(|e| {
        warn!("Ignoring unreadable prefs: {e}");
        None
    });
    let auth = Auth::new();
    if let Some(user) = prefs.as_ref().and_then(|p| p.user.clone()) {
        auth.sign_in(user);
    }

    match cli.command {
        Commands::Login { uid, email } => {
            let identity = Identity::new(uid, email);
            let prefs = Prefs { offline: config.mode.is_offline(), user: Some(identity.clone()) };
            prefs.save(&config.data_dir)?;
            auth.sign_in(identity);
            println!("Signed in");
            Ok(())
        }
        Commands::Logout => {
            sign_out(&auth, &config.data_dir)?;
            println!("Signed out");
            Ok(())
        }
        Commands::Mode { mode } => {
            let offline = matches!(mode, ModeArg::Offline);
            let user = prefs.and_then(|p| p.user);
            Prefs { offline, user }.save(&config.data_dir)?;
            println!("Mode set to {}", if offline { "offline" } else { "online" });
            Ok(())
        }
        command => {
            let stores = Stores::open(&config, auth).context("Failed to open datastore")?;
            run(command, &config, &stores).await
        }
    }
}

async fn run(command: Commands, config: &Config, stores: &Stores) -> Result<()> {
    match command {
        Commands::Scan { paths, dir, yes } => scan(config, stores, paths, dir, yes).await,
        Commands::Generate { text, size, margin, ec_level, charset, out } => {
            let charset = charset_for_label(&charset)?;
            let mut builder = QRBuilder::new(&text);
            builder.size(size).margin(margin).ec_level(ec_level).charset(charset);
            match out {
                Some(path) => {
                    let img = builder.build().map_err(notice)?;
                    img.save(&path).with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Saved to {}", path.display());
                }
                None => print!("{}", builder.encode().map_err(notice)?.to_str(margin as usize, 1)),
            }
            match stores.history.save_generated(&text) {
                Ok(_) => println!("Saved generated QR to history"),
                Err(e) => eprintln!("{}", e.notice()),
            }
            Ok(())
        }
        Commands::History { action } => history(stores, action),
        Commands::Profile { action } => profile(stores, config.mode, action),
        Commands::Login { .. } | Commands::Logout | Commands::Mode { .. } => Ok(()),
    }
}

fn notice(e: ScanError) -> anyhow::Error {
    anyhow::anyhow!(e.notice())
}

async fn scan(
    config: &Config,
    stores: &Stores,
    mut paths: Vec<PathBuf>,
    dir: Option<PathBuf>,
    accept_rescan: bool,
) -> Result<()> {
    if let Some(dir) = dir {
        paths.extend(image_files(&dir));
    }
    if paths.is_empty() {
        bail!("Nothing to scan");
    }

    let mut session = ScanSession::start(config.intervals(), stores.history.clone());
    for path in &paths {
        match decode_file(path) {
            Ok(Some(value)) => {
                session.submit(RawScanEvent::now(value));
                session.flush().await;
            }
            Ok(None) => println!("{}: No QR code detected", path.display()),
            Err(e) => println!("{}: {}", path.display(), e.notice()),
        }
        while let Some(event) = session.try_next_event() {
            on_event(stores, Some(&session), event, accept_rescan);
        }
    }

    session.stop().await;
    while let Some(event) = session.try_next_event() {
        on_event(stores, None, event, accept_rescan);
    }
    Ok(())
}

/// `session` is `None` once the session has stopped and prompts can no longer
/// be answered.
fn on_event(
    stores: &Stores,
    session: Option<&ScanSession>,
    event: SessionEvent,
    accept_rescan: bool,
) {
    match event {
        SessionEvent::Detected { content, kind, open } => match open {
            OpenAction::Browse(url) => println!("[{kind}] {content} -> {url}"),
            OpenAction::ShowContent(_) => println!("[{kind}] {content}"),
        },
        SessionEvent::Saved(entry) => {
            println!("Saved {}", entry.id);
            if let Err(e) = stores.profiles.increment_scan_count() {
                debug!("Scan count not updated: {e}");
            }
        }
        SessionEvent::SaveFailed { error, .. } => eprintln!("{}", error.notice()),
        SessionEvent::RescanPrompt { content, .. } => match session {
            Some(session) => {
                println!(
                    "Still scanning {content}. Save again? {}",
                    if accept_rescan { "yes" } else { "no" }
                );
                session.reply_rescan(content, accept_rescan, now_ms());
            }
            None => println!("Still scanning {content}"),
        },
    }
}

fn history(stores: &Stores, action: HistoryAction) -> Result<()> {
    let history = &stores.history;
    match action {
        HistoryAction::List { json } => {
            let scans = history.list().map_err(notice)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&scans)?);
            } else if scans.is_empty() {
                println!("No scans yet");
            } else {
                let now = now_ms();
                for s in scans {
                    println!(
                        "{}  {:<9}  {:<12}  {}",
                        s.id,
                        s.kind,
                        relative_time(s.timestamp_ms, now),
                        s.display_text
                    );
                }
            }
        }
        HistoryAction::Open { id } => {
            let Some(entry) = history.get(&id).map_err(notice)? else {
                bail!("No scan with id {id}");
            };
            match open_action(&entry.content, entry.kind) {
                OpenAction::Browse(url) => println!("Open in browser: {url}"),
                OpenAction::ShowContent(content) => println!("{content}"),
            }
        }
        HistoryAction::Delete { id } => {
            history.delete(&id).map_err(notice)?;
            println!("Scan deleted");
        }
        HistoryAction::Clear => {
            history.delete_all().map_err(notice)?;
            println!("All scans deleted");
        }
    }
    Ok(())
}

fn profile(stores: &Stores, mode: AppMode, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Show => {
            let Some(p) = stores.profiles.get_profile().map_err(notice)? else {
                println!("No profile yet");
                return Ok(());
            };
            println!("Name:    {}", p.display_name);
            println!("Email:   {}", p.email);
            println!("Scans:   {}", p.total_scans);
            println!("Mode:    {}", if mode.is_offline() { "offline" } else { "online" });
            if let Some(photo) = decode_photo(&p.photo_base64) {
                println!("Photo:   {}x{}", photo.width(), photo.height());
            }
        }
        ProfileAction::Update { name, photo } => {
            let photo = photo
                .map(|p| image::open(&p).with_context(|| format!("Failed to read {}", p.display())))
                .transpose()?;
            let saved = stores.profiles.save_edit(&name, photo.as_ref()).map_err(notice)?;
            println!("Profile updated for {}", saved.display_name);
        }
    }
    Ok(())
}
