//! Generic file embed: a file-type icon with the file name as caption.

use crate::node::{
    ElementBody, ICON_BLOT, MediaDescriptor, MediaElement, MediaFormat, base_data, base_element,
};
use crate::types::MediaData;

/// Icon class for a media category.
pub fn icon_class(media_type: &str) -> String {
    format!("fas fa-file-{media_type} fa-2x")
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IconFormat;

impl MediaFormat for IconFormat {
    fn blot_name(&self) -> &'static str {
        ICON_BLOT
    }

    fn build(&self, descriptor: &MediaDescriptor) -> MediaElement {
        let data = &descriptor.data;
        let body = ElementBody::Icon {
            icon_class: icon_class(&data.media_type),
            caption: data.name.clone(),
        };
        base_element(ICON_BLOT, descriptor, body)
    }

    fn extract(&self, element: &MediaElement) -> MediaData {
        base_data(element)
    }
}
