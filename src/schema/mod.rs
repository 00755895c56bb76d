pub mod definition;
pub mod io;
pub mod tree;

pub use definition::{RawNode, RawPiece};
pub use tree::{PieceKind, SchemaFolder, SchemaNode, SchemaPiece};
