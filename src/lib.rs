/*!
# Therapeutic Journal

A small journaling web form backed by a shared Google spreadsheet, with
Gemini doing the analysis.

## Overview

A writer signs in with a shared password, types or dictates a diary entry and
submits it. The entry is sent to Gemini for an analytical summary and the raw
text, keywords and summary are appended as one row of the spreadsheet. The
writer only ever sees a confirmation; the analysis is for the therapist.

A separate processor polls the same spreadsheet and fills in the summary and
keyword columns of any row that has text but no summary (rows typed straight
into the sheet, or rows whose analysis failed earlier).

## Spreadsheet layout

| Column | Content |
|--------|---------|
| A | Timestamp `%Y-%m-%d %H:%M:%S` |
| B | Name / identifier |
| C | Diary text |
| D | Unused |
| E | Keywords (text after `TEMAS:`) |
| F | Summary (text before `TEMAS:`); empty means pending |

## Modules

- **entry**: Row schema, entry lifecycle and the `TEMAS:` split
- **config**: TOML secrets file plus environment overrides
- **gemini**: `generateContent` client behind the `GenerativeModel` trait
- **analysis**: Prompts, transcription and entry analysis
- **google_auth**: Service account / refresh token access tokens
- **sheets**: Google Sheets client behind the `Worksheet` trait
- **processor**: Polling backfill of missing analysis
- **login**: Shared password gate and sessions (web)
- **pages**: Handlebars pages (web)
- **app**: Routing and handlers (web)

## Binaries

- `website` - the journal form (`web` feature)
- `processor` - the backfill poller
*/

pub mod analysis;
pub mod config;
pub mod entry;
pub mod error;
pub mod gemini;
pub mod google_auth;
pub mod processor;
pub mod sheets;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod pages;

pub use config::Config;
pub use entry::{Analysis, EntryState, JournalEntry};
pub use error::{JournalError, Result};
pub use gemini::{GenerativeModel, Part};
pub use processor::{CycleReport, Processor};
pub use sheets::Worksheet;
