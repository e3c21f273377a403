//! RESP2 command-frame encoding.
//!
//! A command frame is an array of bulk strings:
//! `*<n>\r\n$<len(v1)>\r\nv1\r\n...$<len(vn)>\r\nvn\r\n`.
//! Lengths are byte counts, not character counts, so arguments may contain
//! arbitrary bytes including `\r` and `\n`.

/// Encode `args` as one RESP array-of-bulk-strings frame into a fresh buffer.
///
/// `args` must be non-empty. Callers that want to reuse an allocation across
/// many frames should prefer [`encode_command_into`].
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_command_into(&mut buf, args);
    buf
}

/// Append the encoded frame for `args` onto `buf` without clearing it first.
///
/// Used by [`crate::tokio::Pipeline`] to accumulate many frames into one
/// buffer before a single write.
pub fn encode_command_into(buf: &mut Vec<u8>, args: &[&[u8]]) {
    debug_assert!(!args.is_empty(), "encode_command requires at least one arg");

    buf.push(b'*');
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");

    for arg in args {
        buf.push(b'$');
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
}
