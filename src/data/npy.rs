// ============================================================
// Layer 4 — .npy Codec
// ============================================================
// Reads and writes numpy's dense array format for u8 data, so
// x_train.npy / y_train.npy stay interchangeable with numpy.
//
// File layout:
//
//   \x93NUMPY | major | minor | header_len | header dict | raw bytes
//      6 B      1 B     1 B     u16 LE (v1)   ASCII, '\n'
//                               u32 LE (v2+)
//
//   header dict: {'descr': '|u1', 'fortran_order': False, 'shape': (2, 800, 1200, 3), }
//
// The preamble plus header is padded with spaces to a multiple of 64 bytes.
//
// Reference: numpy NEP 1 (A Simple File Format for NumPy Arrays)

use anyhow::{bail, ensure, Context, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

/// dtype strings numpy uses for unsigned bytes
const U8_DESCRS: [&str; 3] = ["|u1", "<u1", ">u1"];

/// Serialise a C-ordered u8 array into .npy bytes (format version 1.0)
pub fn encode(shape: &[usize], data: &[u8]) -> Result<Vec<u8>> {
    ensure!(!shape.is_empty(), "cannot encode a zero-dimensional array");
    let expected: usize = shape.iter().product();
    ensure!(
        data.len() == expected,
        "data has {} bytes but shape {:?} needs {}",
        data.len(),
        shape,
        expected
    );

    let shape_str = if shape.len() == 1 {
        // one-element tuples need the trailing comma
        format!("({},)", shape[0])
    } else {
        let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
        format!("({})", dims.join(", "))
    };

    let mut header =
        format!("{{'descr': '|u1', 'fortran_order': False, 'shape': {shape_str}, }}");

    // magic(6) + version(2) + header_len(2) + header + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .context("npy header does not fit a version 1.0 file")?;

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + data.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(data);
    Ok(out)
}

/// Parse .npy bytes holding a C-ordered u8 array.
/// Returns the shape and a borrow of the payload.
pub fn decode(bytes: &[u8]) -> Result<(Vec<usize>, &[u8])> {
    ensure!(
        bytes.len() >= 10 && &bytes[..6] == MAGIC,
        "missing \\x93NUMPY magic string"
    );

    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            ensure!(bytes.len() >= 12, "truncated npy preamble");
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => bail!("unsupported npy format version {v}"),
    };

    let data_start = header_start + header_len;
    ensure!(bytes.len() >= data_start, "truncated npy header");
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .context("npy header is not valid text")?;

    let descr = header_field(header, "descr")?.trim_matches(|c| c == '\'' || c == '"');
    ensure!(
        U8_DESCRS.contains(&descr),
        "unsupported dtype '{descr}', only unsigned 8-bit arrays are supported"
    );

    let fortran_order = header_field(header, "fortran_order")?;
    ensure!(
        fortran_order == "False",
        "Fortran-ordered arrays are not supported"
    );

    let shape = parse_shape(header_field(header, "shape")?)?;
    let expected: usize = shape.iter().product();
    let data = &bytes[data_start..];
    ensure!(
        data.len() == expected,
        "payload has {} bytes but shape {:?} needs {}",
        data.len(),
        shape,
        expected
    );

    Ok((shape, data))
}

/// Raw text of `key`'s value in the header dict.
/// Tuple values run to their closing parenthesis; others to the next ',' or '}'.
fn header_field<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    let needle = format!("'{key}':");
    let start = header
        .find(&needle)
        .with_context(|| format!("npy header has no '{key}' entry"))?
        + needle.len();
    let rest = header[start..].trim_start();

    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)
    } else {
        rest.find([',', '}'])
    }
    .with_context(|| format!("unterminated '{key}' entry in npy header"))?;

    Ok(rest[..end].trim())
}

fn parse_shape(tuple: &str) -> Result<Vec<usize>> {
    let inner = tuple
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .with_context(|| format!("shape '{tuple}' is not a tuple"))?;

    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .with_context(|| format!("bad dimension '{s}' in shape {tuple}"))
        })
        .collect()
}
