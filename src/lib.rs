//! Lossless reading and writing of Lua table-literal files, such as the
//! language files of a game or web app.
//!
//! [`parse`] returns the data as a [`Value`] together with a [`CommentData`]
//! layout log. Edit the value's leaves (usually its strings) and [`render`]
//! writes the file back with every comment, blank line and indent where it
//! was. Rendering an unedited value reproduces the input byte for byte.

mod util;
mod api;
mod error;
mod options;
mod render;

pub mod extricate;
pub mod layout;
pub mod parser;
pub mod reducer;
pub mod tokeniser;
pub mod types;

use tracing::debug;

pub use api::Document;
pub use error::{ExtricateError, ParseError, RenderError};
pub use layout::CommentData;
pub use options::Options;
pub use render::render;
pub use types::{Key, Path, Segment, Table, Value};

type Lines = Vec<(usize, usize)>;

/// Parse a table literal with default [`Options`].
pub fn parse(text: &str) -> Result<(Value, CommentData), ParseError> {
    parse_with(text, &Options::default())
}

pub fn parse_with(text: &str, options: &Options) -> Result<(Value, CommentData), ParseError> {
    let tokens = tokeniser::tokenise_full(text)?;
    let semantic = tokens.iter()
        .filter(|tok| !tok.kind.is_layout())
        .cloned()
        .collect();

    let tree = parser::Parser::with_options(semantic, options).parse_document()?;
    let (value, read) = reducer::reduce_with(&tree, options)?;
    let layout = layout::record(&tokens)?;

    debug!(
        tokens = tokens.len(),
        nodes = read.len(),
        kind = value.type_name(),
        entries = value.len(),
        "parsed",
    );
    Ok((value, layout))
}
