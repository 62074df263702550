use crate::canvas::{Command, Document, ImageFit, Page};
use crate::error::{ReportError, Result};
use crate::font::{FontProgramKind, FontRegistry, RegisteredFont, base14_fallback, char_to_winansi};
use crate::types::{Color, Pt};
use base64::Engine;
use fixed::types::I32F32;
use image::GenericImageView;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;

const PRODUCER: &str = "gemreport";

/// Serializes `document` into PDF bytes. Fonts found in `registry` are
/// embedded; anything else is drawn with a base-14 substitute.
pub fn document_to_pdf(document: &Document, registry: Option<&FontRegistry>) -> Result<Vec<u8>> {
    if document.pages.is_empty() {
        return Err(ReportError::Pdf("document has no pages".to_string()));
    }

    let mut objects: Vec<String> = Vec::new();
    // Fixed slots: 1 catalog, 2 page tree, 3 info, 4 shared resources.
    objects.push(String::new());
    objects.push(String::new());
    objects.push(info_object(document.title.as_deref()));
    objects.push(String::new());
    let mut next_id = objects.len() + 1;

    let font_names = collect_font_names(document);
    let (font_objects, font_resources_list, font_map, after_fonts) =
        build_font_objects(&font_names, registry, next_id);
    objects.extend(font_objects);
    next_id = after_fonts;

    let image_sources = collect_image_sources(document);
    let (image_objects, image_resources, image_map, after_images) =
        build_image_objects(&image_sources, next_id);
    objects.extend(image_objects);
    next_id = after_images;

    objects[3] = format!(
        "<< /Font {} /XObject {} /ProcSet [/PDF /Text /ImageB /ImageC] >>",
        named_resources(&font_resources_list),
        named_resources(&image_resources)
    );

    let mut kids = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let page_id = next_id;
        let content_id = next_id + 1;
        next_id += 2;
        let content = render_page(page, document.page_size.height, &font_map, &image_map);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources 4 0 R /Contents {} 0 R >>",
            fmt_pt(document.page_size.width),
            fmt_pt(document.page_size.height),
            content_id
        ));
        objects.push(stream_object(&content));
        kids.push(format!("{} 0 R", page_id));
    }

    objects[0] = "<< /Type /Catalog /Pages 2 0 R >>".to_string();
    objects[1] = format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        kids.len()
    );

    Ok(build_pdf(&objects, 1, 3))
}

fn collect_font_names(document: &Document) -> Vec<String> {
    let mut names = BTreeSet::new();
    for page in &document.pages {
        let mut current = "Helvetica".to_string();
        let mut stack: Vec<String> = Vec::new();
        for cmd in &page.commands {
            match cmd {
                Command::SaveState | Command::BeginFrame { .. } => stack.push(current.clone()),
                Command::RestoreState | Command::EndFrame => {
                    if let Some(name) = stack.pop() {
                        current = name;
                    }
                }
                Command::SetFontName(name) => current = name.clone(),
                Command::DrawString { .. } => {
                    names.insert(current.clone());
                }
                _ => {}
            }
        }
    }
    names.into_iter().collect()
}

fn collect_image_sources(document: &Document) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::DrawImage { resource_id, .. } = cmd {
                if seen.insert(resource_id.clone()) {
                    out.push(resource_id.clone());
                }
            }
        }
    }
    out
}

fn build_font_objects(
    font_names: &[String],
    registry: Option<&FontRegistry>,
    start_id: usize,
) -> (Vec<String>, Vec<(String, usize)>, BTreeMap<String, String>, usize) {
    let mut objects = Vec::new();
    let mut resources = Vec::new();
    let mut font_map = BTreeMap::new();
    let mut next_id = start_id;

    for (index, name) in font_names.iter().enumerate() {
        let resource = format!("F{}", index + 1);
        match registry.and_then(|registry| registry.resolve(name)) {
            Some(font) => {
                let font_file_id = next_id;
                let descriptor_id = next_id + 1;
                let font_id = next_id + 2;
                objects.push(font_file_object(&font.data, font.program_kind));
                objects.push(font_descriptor_object(font, font_file_id));
                objects.push(simple_font_object(font, descriptor_id));
                resources.push((resource.clone(), font_id));
                next_id += 3;
            }
            None => {
                objects.push(base14_font_object(base14_fallback(name)));
                resources.push((resource.clone(), next_id));
                next_id += 1;
            }
        }
        font_map.insert(name.clone(), resource);
    }

    (objects, resources, font_map, next_id)
}

fn build_image_objects(
    sources: &[String],
    start_id: usize,
) -> (Vec<String>, Vec<(String, usize)>, HashMap<String, PlacedImage>, usize) {
    let mut objects = Vec::new();
    let mut resources = Vec::new();
    let mut name_map = HashMap::new();
    let mut content_map: HashMap<[u8; 32], PlacedImage> = HashMap::new();
    let mut next_id = start_id;

    for source in sources {
        let Some(image) = load_image(source) else {
            log::warn!("image {} could not be loaded; omitting it", preview(source));
            continue;
        };
        let digest = image.digest();
        if let Some(placed) = content_map.get(&digest) {
            name_map.insert(source.clone(), placed.clone());
            continue;
        }

        let name = format!("Im{}", resources.len() + 1);
        if let Some(alpha) = image.alpha.as_ref() {
            let mask_id = next_id;
            objects.push(image_smask_object(alpha));
            objects.push(image_object(&image, Some(mask_id)));
            resources.push((name.clone(), next_id + 1));
            next_id += 2;
        } else {
            objects.push(image_object(&image, None));
            resources.push((name.clone(), next_id));
            next_id += 1;
        }
        let placed = PlacedImage {
            name,
            width: image.width,
            height: image.height,
        };
        content_map.insert(digest, placed.clone());
        name_map.insert(source.clone(), placed);
    }

    (objects, resources, name_map, next_id)
}

#[derive(Debug, Clone)]
struct PlacedImage {
    name: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone)]
struct TextState {
    font_name: String,
    font_size: Pt,
    char_spacing: Pt,
    fill: Color,
}

fn render_page(
    page: &Page,
    page_height: Pt,
    font_map: &BTreeMap<String, String>,
    image_map: &HashMap<String, PlacedImage>,
) -> String {
    let mut out = String::new();
    let mut state = TextState {
        font_name: "Helvetica".to_string(),
        font_size: Pt::from_f32(12.0),
        char_spacing: Pt::ZERO,
        fill: Color::BLACK,
    };
    let mut state_stack: Vec<TextState> = Vec::new();
    // Height of the coordinate space commands are flipped against.
    let mut heights: Vec<Pt> = vec![page_height];

    for cmd in &page.commands {
        let height = heights.last().copied().unwrap_or(page_height);
        match cmd {
            Command::SaveState => {
                state_stack.push(state.clone());
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some(saved) = state_stack.pop() {
                    state = saved;
                }
                out.push_str("Q\n");
            }
            Command::BeginFrame { matrix, height } => {
                state_stack.push(state.clone());
                heights.push(*height);
                out.push_str(&format!(
                    "q\n{} {} {} {} {} {} cm\n",
                    fmt(matrix[0]),
                    fmt(matrix[1]),
                    fmt(matrix[2]),
                    fmt(matrix[3]),
                    fmt(matrix[4]),
                    fmt(matrix[5])
                ));
            }
            Command::EndFrame => {
                if heights.len() > 1 {
                    heights.pop();
                }
                if let Some(saved) = state_stack.pop() {
                    state = saved;
                }
                out.push_str("Q\n");
            }
            Command::SetFillColor(color) => {
                state.fill = *color;
                out.push_str(&format!(
                    "{} {} {} rg\n",
                    fmt(clamp_unit(color.r)),
                    fmt(clamp_unit(color.g)),
                    fmt(clamp_unit(color.b))
                ));
            }
            Command::SetFontName(name) => state.font_name = name.clone(),
            Command::SetFontSize(size) => state.font_size = *size,
            Command::SetCharSpacing(spacing) => state.char_spacing = *spacing,
            Command::ClipRect {
                x,
                y,
                width,
                height: clip_height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nW\nn\n",
                    fmt_pt(*x),
                    fmt_pt(height - *y - *clip_height),
                    fmt_pt(*width),
                    fmt_pt(*clip_height)
                ));
            }
            Command::DrawString { x, y, text } => {
                let resource = font_map
                    .get(&state.font_name)
                    .map(String::as_str)
                    .unwrap_or("F1");
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(state.font_size)));
                if state.char_spacing != Pt::ZERO {
                    out.push_str(&format!("{} Tc\n", fmt_pt(state.char_spacing)));
                }
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(height - *y - state.font_size)
                ));
                out.push_str(&format!("({}) Tj\n", encode_winansi_pdf_string(text)));
                out.push_str("ET\n");
            }
            Command::DrawRect {
                x,
                y,
                width,
                height: rect_height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nf\n",
                    fmt_pt(*x),
                    fmt_pt(height - *y - *rect_height),
                    fmt_pt(*width),
                    fmt_pt(*rect_height)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height: image_height,
                resource_id,
                fit,
            } => {
                if let Some(placed) = image_map.get(resource_id) {
                    let bottom = height - *y - *image_height;
                    out.push_str("q\n");
                    let (draw_x, draw_y, draw_w, draw_h) = match fit {
                        ImageFit::Fill => (*x, bottom, *width, *image_height),
                        ImageFit::Cover => {
                            out.push_str(&format!(
                                "{} {} {} {} re\nW\nn\n",
                                fmt_pt(*x),
                                fmt_pt(bottom),
                                fmt_pt(*width),
                                fmt_pt(*image_height)
                            ));
                            cover_box(*x, bottom, *width, *image_height, placed.width, placed.height)
                        }
                    };
                    out.push_str(&format!(
                        "{} 0 0 {} {} {} cm\n",
                        fmt_pt(draw_w),
                        fmt_pt(draw_h),
                        fmt_pt(draw_x),
                        fmt_pt(draw_y)
                    ));
                    out.push_str(&format!("/{} Do\n", placed.name));
                    out.push_str("Q\n");
                }
            }
        }
    }

    out
}

// Box an image of `image_w` x `image_h` pixels is drawn into so it covers
// the target box, centred.
fn cover_box(x: Pt, y: Pt, width: Pt, height: Pt, image_w: u32, image_h: u32) -> (Pt, Pt, Pt, Pt) {
    if image_w == 0 || image_h == 0 {
        return (x, y, width, height);
    }
    let box_w = width.to_f64();
    let box_h = height.to_f64();
    let scale = (box_w / image_w as f64).max(box_h / image_h as f64);
    let draw_w = image_w as f64 * scale;
    let draw_h = image_h as f64 * scale;
    (
        Pt::from_f64(x.to_f64() - (draw_w - box_w) / 2.0),
        Pt::from_f64(y.to_f64() - (draw_h - box_h) / 2.0),
        Pt::from_f64(draw_w),
        Pt::from_f64(draw_h),
    )
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
    alpha: Option<AlphaData>,
}

struct AlphaData {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageData {
    fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        if let Some(alpha) = &self.alpha {
            hasher.update(&alpha.data);
        }
        hasher.finalize().into()
    }
}

fn load_image(source: &str) -> Option<ImageData> {
    if let Some((mime, data)) = parse_data_uri(source) {
        return decode_image_bytes(&data, Some(&mime));
    }
    let bytes = std::fs::read(Path::new(source)).ok()?;
    decode_image_bytes(&bytes, None)
}

fn decode_image_bytes(data: &[u8], mime: Option<&str>) -> Option<ImageData> {
    let format = match mime {
        Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
        Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
            Some(image::ImageFormat::Jpeg)
        }
        _ => image::guess_format(data).ok(),
    };

    let decoded = image::load_from_memory(data).ok()?;
    let (width, height) = decoded.dimensions();

    if matches!(format, Some(image::ImageFormat::Jpeg)) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Some(ImageData {
            width,
            height,
            color_space,
            filter: "/DCTDecode",
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Some(ImageData {
        width,
        height,
        color_space: "/DeviceRGB",
        filter: "/FlateDecode",
        data: flate_compress(&rgb),
        alpha: has_alpha.then(|| AlphaData {
            width,
            height,
            data: flate_compress(&alpha),
        }),
    })
}

pub(crate) fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, data_part) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|value| !value.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn image_object(image: &ImageData, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let filters = match image.filter {
        "/DCTDecode" => "[/ASCIIHexDecode /DCTDecode]",
        _ => "[/ASCIIHexDecode /FlateDecode]",
    };
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Length {} /Filter {}{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        stream_data.len(),
        filters,
        smask,
        stream_data
    )
}

fn image_smask_object(alpha: &AlphaData) -> String {
    let stream_data = encode_stream_data(&alpha.data);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        alpha.width,
        alpha.height,
        stream_data.len(),
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn base14_font_object(base: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        base
    )
}

fn simple_font_object(font: &RegisteredFont, descriptor_id: usize) -> String {
    let base = sanitize_font_name(&font.postscript_name);
    let metrics = &font.metrics;
    let subtype = match font.program_kind {
        FontProgramKind::OpenTypeCff => "Type1",
        FontProgramKind::TrueType => "TrueType",
    };
    let widths = metrics
        .widths
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<< /Type /Font /Subtype /{} /BaseFont /{} /FirstChar {} /LastChar {} /Widths [{}] /FontDescriptor {} 0 R /Encoding /WinAnsiEncoding >>",
        subtype, base, metrics.first_char, metrics.last_char, widths, descriptor_id
    )
}

fn font_descriptor_object(font: &RegisteredFont, font_file_id: usize) -> String {
    let base = sanitize_font_name(&font.postscript_name);
    let metrics = &font.metrics;
    let mut flags = 32;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let font_file_entry = match font.program_kind {
        FontProgramKind::OpenTypeCff => "FontFile3",
        FontProgramKind::TrueType => "FontFile2",
    };
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV 80 /MissingWidth {} /{} {} 0 R >>",
        base,
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        metrics.missing_width,
        font_file_entry,
        font_file_id
    )
}

fn font_file_object(data: &[u8], kind: FontProgramKind) -> String {
    let stream_data = encode_stream_data(&flate_compress(data));
    let mut dict = format!(
        "<< /Length {} /Length1 {} /Filter [/ASCIIHexDecode /FlateDecode]",
        stream_data.len(),
        data.len()
    );
    if matches!(kind, FontProgramKind::OpenTypeCff) {
        dict.push_str(" /Subtype /OpenType");
    }
    dict.push_str(" >>\nstream\n");
    format!("{}{}\nendstream", dict, stream_data)
}

fn named_resources(entries: &[(String, usize)]) -> String {
    let entries = entries
        .iter()
        .map(|(name, id)| format!("/{} {} 0 R", name, id))
        .collect::<Vec<_>>();
    format!("<< {} >>", entries.join(" "))
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn info_object(title: Option<&str>) -> String {
    let mut entries = vec![format!("/Producer ({})", PRODUCER)];
    if let Some(title) = title {
        entries.push(format!("/Title ({})", encode_winansi_pdf_string(title)));
    }
    format!("<< {} >>", entries.join(" "))
}

fn build_pdf(objects: &[String], catalog_id: usize, info_id: usize) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut hasher = Sha256::new();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(obj.as_bytes());
        out.extend_from_slice(b"\nendobj\n");
        hasher.update(obj.as_bytes());
    }
    let digest = hasher.finalize();
    let id = digest[..16]
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<String>();

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }

    let trailer = format!(
        "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R /ID [<{}> <{}>] >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        catalog_id,
        info_id,
        id,
        id,
        xref_start
    );
    out.extend_from_slice(trailer.as_bytes());
    out
}

fn encode_winansi_pdf_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let byte = char_to_winansi(ch).unwrap_or(b'?');
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    out
}

fn preview(source: &str) -> String {
    if source.starts_with("data:") {
        let head: String = source.chars().take(32).collect();
        format!("{}...", head)
    } else {
        source.to_string()
    }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
