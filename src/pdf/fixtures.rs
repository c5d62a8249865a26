//! In-memory PDFs for tests.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use qrcode::QrCode;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

/// Render a QR code with a quiet zone, 6px per module
pub(crate) fn qr_code(payload: &str) -> GrayImage {
    QrCode::new(payload.as_bytes())
        .unwrap()
        .render::<Luma<u8>>()
        .module_dimensions(6, 6)
        .build()
}

fn jpeg_bytes(image: &GrayImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn gray_xobject(image: &GrayImage, filter: Object, data: Vec<u8>) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width() as i64,
            "Height" => image.height() as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => filter,
        },
        data,
    )
}

pub(crate) fn jpeg_image(image: &GrayImage) -> Stream {
    gray_xobject(image, "DCTDecode".into(), jpeg_bytes(image))
}

/// Raw gray samples under `/FlateDecode`
pub(crate) fn flate_image(image: &GrayImage) -> Stream {
    gray_xobject(image, "FlateDecode".into(), zlib(image.as_raw()))
}

/// A JPEG additionally compressed with `/Filter [/FlateDecode /DCTDecode]`
pub(crate) fn flate_jpeg_image(image: &GrayImage) -> Stream {
    let chain = vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"DCTDecode".to_vec())];
    gray_xobject(image, chain.into(), zlib(&jpeg_bytes(image)))
}

/// A raw JPEG 2000 codestream for a uniform 8-bit gray image.
///
/// One tile, no wavelet levels and a single empty packet, so every
/// coefficient is zero and every sample decodes to the mid level 128.
pub(crate) fn jpx_codestream(width: u32, height: u32) -> Vec<u8> {
    let mut j2k = vec![0xFF, 0x4F]; // SOC

    // SIZ: one unsigned 8-bit component in a single tile
    j2k.extend([0xFF, 0x51, 0x00, 41, 0x00, 0x00]);
    for value in [width, height, 0, 0, width, height, 0, 0] {
        j2k.extend(value.to_be_bytes());
    }
    j2k.extend([0x00, 0x01, 0x07, 0x01, 0x01]);

    // COD: LRCP, one layer, no MCT, zero levels, 64x64 blocks, 5/3 reversible
    j2k.extend([0xFF, 0x52, 0x00, 12, 0x00, 0x00, 0x00, 0x01, 0x00]);
    j2k.extend([0x00, 0x04, 0x04, 0x00, 0x01]);

    // QCD: no quantization, two guard bits, one subband with exponent 8
    j2k.extend([0xFF, 0x5C, 0x00, 4, 0x40, 0x40]);

    // SOT covering itself, SOD and the one-byte packet
    j2k.extend([0xFF, 0x90, 0x00, 10, 0x00, 0x00]);
    j2k.extend(15u32.to_be_bytes());
    j2k.extend([0x00, 0x01]);
    j2k.extend([0xFF, 0x93]); // SOD
    j2k.push(0x00); // empty packet

    j2k.extend([0xFF, 0xD9]); // EOC
    j2k
}

pub(crate) fn unsupported_image() -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 8,
            "Height" => 8,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 1,
            "Filter" => "CCITTFaxDecode",
        },
        vec![0u8; 8],
    )
}

pub(crate) fn blank_page() -> Vec<Stream> {
    Vec::new()
}

pub(crate) fn marker_page(payload: &str) -> Vec<Stream> {
    vec![jpeg_image(&qr_code(payload))]
}

/// One page per entry, each drawing nothing but owning the given image XObjects
pub(crate) fn build_pdf(pages: Vec<Vec<Stream>>) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_count = pages.len() as i64;

    let mut kids: Vec<Object> = Vec::new();
    for images in pages {
        let mut xobjects = Dictionary::new();
        for (i, image) in images.into_iter().enumerate() {
            let image_id = doc.add_object(image);
            xobjects.set(format!("Im{}", i), image_id);
        }

        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub(crate) fn save_fixture(dir: &Path, name: &str, pages: Vec<Vec<Stream>>) -> PathBuf {
    let path = dir.join(name);
    build_pdf(pages).save(&path).unwrap();
    path
}
