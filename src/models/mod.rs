mod image;
mod post;
mod tag;
mod user;

pub use image::*;
pub use post::*;
pub use tag::*;
pub use user::*;
