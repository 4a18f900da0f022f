//! Terminal icons shared by the CLI commands.
//!
//! Fall back to plain ASCII on terminals without emoji support.

use console::Emoji;

// Verdicts
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

// Documents
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+ ");
pub static FILE_MOD: Emoji<'_, '_> = Emoji("📝 ", "~ ");
pub static FILE_DEL: Emoji<'_, '_> = Emoji("🗑️  ", "- ");

// Review host
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R] ");
