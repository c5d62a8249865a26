use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::fmt;
use tracing::warn;

// Guards the /Parent walk against malformed page trees with cycles.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Final encoding filter of an image XObject's sample data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFilter {
    Flate,
    Dct,
    Jpx,
    Other(String),
}

impl ImageFilter {
    pub fn from_name(name: &[u8]) -> Self {
        match name {
            b"FlateDecode" | b"Fl" => ImageFilter::Flate,
            b"DCTDecode" | b"DCT" => ImageFilter::Dct,
            b"JPXDecode" => ImageFilter::Jpx,
            other => ImageFilter::Other(String::from_utf8_lossy(other).into_owned()),
        }
    }
}

impl fmt::Display for ImageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFilter::Flate => write!(f, "/FlateDecode"),
            ImageFilter::Dct => write!(f, "/DCTDecode"),
            ImageFilter::Jpx => write!(f, "/JPXDecode"),
            ImageFilter::Other(name) => write!(f, "/{}", name),
        }
    }
}

/// An image XObject pulled out of a page.
///
/// For [`ImageFilter::Flate`] images `data` holds the decompressed samples.
/// For DCT and JPX images it holds the codec payload with any Flate or LZW
/// stages removed, and for every other filter the stream content as stored.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub name: String,
    pub filter: ImageFilter,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub data: Vec<u8>,
}

/// Collect the image XObjects of a page, including ones from inherited resources.
///
/// Images that cannot be read are logged and left out.
pub fn page_images(doc: &Document, page_id: ObjectId) -> Vec<EmbeddedImage> {
    let xobjects = match find_resources(doc, page_id)
        .and_then(|resources| resources.get(b"XObject").ok())
        .and_then(|obj| resolve_dict(doc, obj))
    {
        Some(d) => d,
        None => return Vec::new(),
    };

    let mut images = Vec::new();
    for (name, obj) in xobjects.iter() {
        let stream = match doc.dereference(obj) {
            Ok((_, Object::Stream(stream))) => stream,
            _ => continue,
        };

        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|subtype| subtype == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        let name = String::from_utf8_lossy(name).into_owned();
        if let Some(image) = read_image(doc, name, stream) {
            images.push(image);
        }
    }

    images
}

fn read_image(doc: &Document, name: String, stream: &Stream) -> Option<EmbeddedImage> {
    let chain = filter_chain(doc, &stream.dict);
    let filter = image_filter(&chain);

    let data = match &filter {
        ImageFilter::Flate => stream.decompressed_content(),
        ImageFilter::Dct | ImageFilter::Jpx => {
            undo_transport_filters(stream, &chain[..chain.len() - 1])
        }
        ImageFilter::Other(_) => Ok(stream.content.clone()),
    };
    let data = match data {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to unpack image {} ({}): {}", name, filter, e);
            return None;
        }
    };

    Some(EmbeddedImage {
        width: dict_u32(doc, &stream.dict, b"Width").unwrap_or(0),
        height: dict_u32(doc, &stream.dict, b"Height").unwrap_or(0),
        bits_per_component: dict_u32(doc, &stream.dict, b"BitsPerComponent")
            .and_then(|bits| u8::try_from(bits).ok())
            .unwrap_or(8),
        name,
        filter,
        data,
    })
}

/// Filter names in decoding order
fn filter_chain(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    let filter = match dict.get(b"Filter").and_then(|obj| doc.dereference(obj)) {
        Ok((_, obj)) => obj,
        Err(_) => return Vec::new(),
    };

    match filter {
        Object::Name(name) => vec![name.clone()],
        Object::Array(filters) => filters
            .iter()
            .filter_map(|f| doc.dereference(f).ok())
            .filter_map(|(_, f)| f.as_name().ok())
            .map(<[u8]>::to_vec)
            .collect(),
        _ => Vec::new(),
    }
}

/// The last filter decides how the samples are finally encoded.
///
/// Stages ahead of a DCT or JPX filter must be ones lopdf can undo, otherwise
/// the image is reported under the first stage that cannot be undone.
fn image_filter(chain: &[Vec<u8>]) -> ImageFilter {
    let (last, leading) = match chain.split_last() {
        Some(split) => split,
        None => return ImageFilter::Other("None".to_string()),
    };

    let filter = ImageFilter::from_name(last);
    if filter == ImageFilter::Flate {
        return filter;
    }
    match leading.iter().find(|name| !is_transport_filter(name.as_slice())) {
        Some(stage) => ImageFilter::Other(String::from_utf8_lossy(stage).into_owned()),
        None => filter,
    }
}

fn is_transport_filter(name: &[u8]) -> bool {
    matches!(name, b"FlateDecode" | b"Fl" | b"LZWDecode" | b"LZW")
}

/// Strip the `leading` stages of a chain such as `[/FlateDecode /DCTDecode]`,
/// leaving the bytes the final codec expects.
fn undo_transport_filters(stream: &Stream, leading: &[Vec<u8>]) -> lopdf::Result<Vec<u8>> {
    let filter = match leading {
        [] => return Ok(stream.content.clone()),
        [single] => Object::Name(single.clone()),
        _ => Object::Array(leading.iter().cloned().map(Object::Name).collect()),
    };

    let mut dict = Dictionary::new();
    dict.set("Filter", filter);
    if let (1, Ok(Object::Array(params))) = (leading.len(), stream.dict.get(b"DecodeParms")) {
        if let Some(stage_params @ Object::Dictionary(_)) = params.first() {
            dict.set("DecodeParms", stage_params.clone());
        }
    }

    Stream::new(dict, stream.content.clone()).decompressed_content()
}

fn find_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match doc.dereference(obj) {
        Ok((_, Object::Dictionary(dict))) => Some(dict),
        _ => None,
    }
}

fn dict_u32(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<u32> {
    let obj = dict.get(key).ok()?;
    let (_, obj) = doc.dereference(obj).ok()?;
    obj.as_i64().ok().and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{
        build_pdf, flate_image, flate_jpeg_image, jpeg_image, qr_code, unsupported_image,
    };
    use lopdf::dictionary;

    #[test]
    fn test_filter_names() {
        assert_eq!(ImageFilter::from_name(b"FlateDecode"), ImageFilter::Flate);
        assert_eq!(ImageFilter::from_name(b"DCTDecode"), ImageFilter::Dct);
        assert_eq!(ImageFilter::from_name(b"JPXDecode"), ImageFilter::Jpx);
        assert_eq!(
            ImageFilter::from_name(b"CCITTFaxDecode"),
            ImageFilter::Other("CCITTFaxDecode".to_string())
        );
        assert_eq!(ImageFilter::Dct.to_string(), "/DCTDecode");
    }

    fn names(chain: &[&str]) -> Vec<Vec<u8>> {
        chain.iter().map(|name| name.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_filter_chain_uses_last_entry() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Filter" => vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"DCTDecode".to_vec())],
        };
        let chain = filter_chain(&doc, &dict);
        assert_eq!(chain, names(&["FlateDecode", "DCTDecode"]));
        assert_eq!(image_filter(&chain), ImageFilter::Dct);

        assert!(filter_chain(&doc, &dictionary! {}).is_empty());
        assert_eq!(image_filter(&[]), ImageFilter::Other("None".to_string()));
    }

    #[test]
    fn test_filter_chain_with_unknown_stage() {
        assert_eq!(
            image_filter(&names(&["ASCIIHexDecode", "DCTDecode"])),
            ImageFilter::Other("ASCIIHexDecode".to_string())
        );
        assert_eq!(
            image_filter(&names(&["LZWDecode", "FlateDecode", "JPXDecode"])),
            ImageFilter::Jpx
        );
        assert_eq!(
            image_filter(&names(&["ASCII85Decode", "FlateDecode"])),
            ImageFilter::Flate
        );
    }

    #[test]
    fn test_flate_stages_are_undone() {
        let qr = qr_code("RPSEQ:A");
        let doc = build_pdf(vec![vec![flate_jpeg_image(&qr)], vec![flate_image(&qr)]]);
        let pages = doc.get_pages();

        let jpeg = page_images(&doc, pages[&1]);
        assert_eq!(jpeg.len(), 1);
        assert_eq!(jpeg[0].filter, ImageFilter::Dct);
        assert_eq!(&jpeg[0].data[..2], &[0xFF, 0xD8]);

        let raw = page_images(&doc, pages[&2]);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].filter, ImageFilter::Flate);
        assert_eq!(raw[0].data, qr.as_raw().clone());
    }

    #[test]
    fn test_page_images_reads_xobjects() {
        let doc = build_pdf(vec![
            vec![jpeg_image(&qr_code("RPSEQ:A")), unsupported_image()],
            vec![],
        ]);
        let pages = doc.get_pages();

        let first = page_images(&doc, pages[&1]);
        assert_eq!(first.len(), 2);
        let filters: Vec<_> = first.iter().map(|i| i.filter.clone()).collect();
        assert!(filters.contains(&ImageFilter::Dct));
        assert!(filters.contains(&ImageFilter::Other("CCITTFaxDecode".to_string())));
        let jpeg = first.iter().find(|i| i.filter == ImageFilter::Dct).unwrap();
        assert!(jpeg.width > 0 && jpeg.height > 0);
        assert_eq!(jpeg.bits_per_component, 8);

        assert!(page_images(&doc, pages[&2]).is_empty());
    }

    #[test]
    fn test_inherited_resources() {
        let mut doc = build_pdf(vec![vec![jpeg_image(&qr_code("RPSEQ:A"))]]);
        let page_id = doc.get_pages()[&1];

        // move the page's resources up to the page tree root
        let resources = doc
            .get_dictionary_mut(page_id)
            .unwrap()
            .remove(b"Resources")
            .unwrap();
        let parent = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Parent")
            .and_then(Object::as_reference)
            .unwrap();
        doc.get_dictionary_mut(parent)
            .unwrap()
            .set("Resources", resources);

        assert_eq!(page_images(&doc, page_id).len(), 1);
    }
}
