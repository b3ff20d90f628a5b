//! Inline image embed with optional thumbnail bounds.

use crate::node::{
    ElementBody, IMAGE_BLOT, MediaDescriptor, MediaElement, MediaFormat, base_data, base_element,
};
use crate::sanitize::sanitize_src;
use crate::types::MediaData;

#[derive(Clone, Copy, Debug, Default)]
pub struct ImageFormat;

impl MediaFormat for ImageFormat {
    fn blot_name(&self) -> &'static str {
        IMAGE_BLOT
    }

    fn build(&self, descriptor: &MediaDescriptor) -> MediaElement {
        let data = &descriptor.data;
        let body = ElementBody::Image {
            src: data.src.as_deref().map(sanitize_src),
            alt: data.name.clone(),
            thumbnail: data.thumbnail,
        };
        base_element(IMAGE_BLOT, descriptor, body)
    }

    fn extract(&self, element: &MediaElement) -> MediaData {
        let mut data = base_data(element);
        if let ElementBody::Image { src, thumbnail, .. } = &element.body {
            data.src = src.clone();
            data.thumbnail = *thumbnail;
        }
        data
    }
}
