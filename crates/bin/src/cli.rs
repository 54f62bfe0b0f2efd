//! CLI argument definitions for the folio binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use folio::auth::AccessLevel;

/// Document storage backend.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StoreKind {
    /// One JSON file per document under the data directory.
    File,
    /// In-memory only; documents vanish on exit.
    Memory,
}

/// Highest access level handed out to unauthenticated clients.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AccessCeiling {
    /// Anyone may create, edit, and read documents.
    Create,
    /// Anyone may edit and read existing documents.
    Edit,
    /// Anyone may read; nobody may change anything.
    Read,
}

impl From<AccessCeiling> for AccessLevel {
    fn from(ceiling: AccessCeiling) -> Self {
        match ceiling {
            AccessCeiling::Create => AccessLevel::Create,
            AccessCeiling::Edit => AccessLevel::Edit,
            AccessCeiling::Read => AccessLevel::Read,
        }
    }
}

/// Folio collaborative text-editing server
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Folio: collaborative text editing over WebSockets")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "FOLIO_PORT")]
    pub port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "FOLIO_HOST")]
    pub host: String,

    /// Storage backend to use
    #[arg(short, long, default_value = "file", env = "FOLIO_STORE")]
    pub store: StoreKind,

    /// Data directory for the file store
    #[arg(short = 'D', long, default_value = "./folio-data", env = "FOLIO_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Access level granted to every client
    #[arg(long, default_value = "create", env = "FOLIO_ACCESS")]
    pub access: AccessCeiling,

    /// Optional JSON config file overriding curator and binder tuning
    #[arg(short, long, env = "FOLIO_CONFIG")]
    pub config: Option<PathBuf>,
}
