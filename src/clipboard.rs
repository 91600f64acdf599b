//! System clipboard export. The loupe copies the *original* decoded pixels,
//! not the current LOD texture, so paste targets get full resolution.

use std::borrow::Cow;

use image::RgbaImage;

use crate::error::Error;

/// Write an RGBA image to the system clipboard.
pub fn copy_rgba(image: &RgbaImage) -> Result<(), Error> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|err| Error::ClipboardUnsupported(err.to_string()))?;
    let data = arboard::ImageData {
        width: image.width() as usize,
        height: image.height() as usize,
        bytes: Cow::Borrowed(image.as_raw()),
    };
    clipboard
        .set_image(data)
        .map_err(|err| Error::ClipboardUnsupported(err.to_string()))?;
    Ok(())
}
