//! Entities the authentication core and the API handlers work with, and the
//! store traits through which they are persisted.

pub mod note;
pub mod user;

pub use note::{NewNote, Note, NoteDraft, NoteService, NoteStore, NoteType};
pub use user::{NewUser, User, UserStore};
