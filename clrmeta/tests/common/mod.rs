//! A small builder for crafting metadata images byte by byte, for tests
//! that need control over row counts and raw row contents.

/// Everything that goes into a synthesized image.
#[derive(Default)]
pub struct ImageSpec {
    /// `(table id, row count, sorted, raw row bytes)` per valid table, in
    /// table id order.
    pub tables: Vec<(u8, u32, bool, Vec<u8>)>,
    pub strings: Vec<u8>,
    pub blobs: Vec<u8>,
    pub user_strings: Vec<u8>,
    pub guids: Vec<u8>,
    pub minimal_delta: bool,
}

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

fn stream_header_size(name: &str) -> usize {
    8 + align4(name.len() + 1)
}

/// Serializes the spec into metadata-root bytes per II.24.2.
pub fn build_image(spec: &ImageSpec) -> Vec<u8> {
    const VERSION: &str = "v4.0.30319";

    let mut valid = 0u64;
    let mut sorted = 0u64;
    for (id, _, is_sorted, _) in &spec.tables {
        valid |= 1 << id;
        if *is_sorted {
            sorted |= 1 << id;
        }
    }

    let tables_size = 24
        + spec.tables.len() * 4
        + spec.tables.iter().map(|(_, _, _, d)| d.len()).sum::<usize>();

    let tables_name = if spec.minimal_delta { "#-" } else { "#~" };
    let mut streams: Vec<(&str, usize)> = Vec::new();
    if spec.minimal_delta {
        streams.push(("#JTD", 0));
    }
    if !spec.strings.is_empty() {
        streams.push(("#Strings", align4(spec.strings.len())));
    }
    if !spec.blobs.is_empty() {
        streams.push(("#Blob", spec.blobs.len()));
    }
    if !spec.guids.is_empty() {
        streams.push(("#GUID", spec.guids.len()));
    }
    if !spec.user_strings.is_empty() {
        streams.push(("#US", spec.user_strings.len()));
    }
    streams.push((tables_name, tables_size));

    let version_buf_len = align4(VERSION.len() + 1);
    let root_size = 16 + version_buf_len + 4;
    let headers_size: usize = streams.iter().map(|(name, _)| stream_header_size(name)).sum();

    let mut buf = Vec::new();
    buf.extend_from_slice(&0x424A_5342u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&(version_buf_len as u32).to_le_bytes());
    buf.extend_from_slice(VERSION.as_bytes());
    buf.resize(16 + version_buf_len, 0);
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&(streams.len() as u16).to_le_bytes());

    // Stream headers, payload offsets assigned in header order.
    let mut header_pos = root_size;
    let mut payload_pos = root_size + headers_size;
    for (name, size) in &streams {
        let offset = if *size == 0 && *name == "#JTD" {
            header_pos
        } else {
            let offset = payload_pos;
            payload_pos += size;
            offset
        };
        buf.extend_from_slice(&(offset as u32).to_le_bytes());
        buf.extend_from_slice(&(*size as u32).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        buf.resize(align4(buf.len()), 0);
        header_pos += stream_header_size(name);
    }

    // Payloads.
    if !spec.strings.is_empty() {
        buf.extend_from_slice(&spec.strings);
        buf.resize(align4(buf.len()), 0);
    }
    if !spec.blobs.is_empty() {
        buf.extend_from_slice(&spec.blobs);
    }
    if !spec.guids.is_empty() {
        buf.extend_from_slice(&spec.guids);
    }
    if !spec.user_strings.is_empty() {
        buf.extend_from_slice(&spec.user_strings);
    }

    // Tables stream.
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&[2, 0, 0, 1]);
    buf.extend_from_slice(&valid.to_le_bytes());
    buf.extend_from_slice(&sorted.to_le_bytes());
    for (_, rows, _, _) in &spec.tables {
        buf.extend_from_slice(&rows.to_le_bytes());
    }
    for (_, _, _, data) in &spec.tables {
        buf.extend_from_slice(data);
    }

    buf
}
