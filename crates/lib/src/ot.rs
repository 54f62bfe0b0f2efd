//! The operational-transformation engine.
//!
//! Pure functions over [`Transform`] and document text. All state lives in
//! the binder; everything here is referentially transparent so the rewrite
//! rules can be tested exhaustively in isolation.
//!
//! Indices are Unicode code points throughout. Byte indexing would
//! silently corrupt any document containing multi-byte characters.

use thiserror::Error;

use crate::transform::Transform;

/// Errors produced when validating or applying a transform.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum OtError {
    /// The transform does not fit the document it targets.
    #[error(
        "invalid transform: position {position} + delete {delete} exceeds document length {len}"
    )]
    InvalidTransform {
        position: usize,
        delete: usize,
        len: usize,
    },

    /// Versions are 1-based; zero can never be produced by an edit.
    #[error("invalid transform: version must be positive")]
    ZeroVersion,
}

/// Apply `t` to `content`, returning the new text.
///
/// Fails with [`OtError::InvalidTransform`] when the edit falls outside
/// the document, leaving the caller's state untouched.
pub fn apply(content: &str, t: &Transform) -> Result<String, OtError> {
    if t.version == 0 {
        return Err(OtError::ZeroVersion);
    }

    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    if t.position > len || t.position + t.delete > len {
        return Err(OtError::InvalidTransform {
            position: t.position,
            delete: t.delete,
            len,
        });
    }

    let mut out = String::with_capacity(content.len() + t.insert.len());
    out.extend(&chars[..t.position]);
    out.push_str(&t.insert);
    out.extend(&chars[t.position + t.delete..]);
    Ok(out)
}

/// Rewrite pending `t` against already-applied `u`, so that applying `u`
/// then the rewritten `t` preserves the intent `t` had on the pre-`u`
/// text.
///
/// When the two edits touch disjoint regions this is a plain position
/// shift. When their deletion regions overlap, `t`'s deletion is clipped
/// to the part of the original text that still exists after `u`, and `t`
/// collapses to just after `u`'s insertion if its own start was deleted.
/// Ties at one original position resolve in server acceptance order: the
/// later transform's text lands after the earlier one's.
///
/// Rewriting is relative to `u` alone; calling it twice with the same `u`
/// double-shifts. The binder walks each pending transform across the
/// applied suffix exactly once.
pub fn rewrite(t: &mut Transform, u: &Transform) {
    let u_ins = u.insert_len();

    if u.position + u.delete <= t.position {
        // u entirely before t: shift by u's net length change.
        t.position = (t.position as isize + u_ins as isize - u.delete as isize) as usize;
    } else if u.position >= t.position + t.delete {
        // u entirely after t: untouched.
    } else {
        // Deletion regions overlap. Clip t's deletion to what survives u.
        let overlap_start = t.position.max(u.position);
        let overlap_end = (t.position + t.delete).min(u.position + u.delete);
        t.delete -= overlap_end.saturating_sub(overlap_start);

        if t.position >= u.position {
            // t started inside u's deleted region; land after u's insert.
            t.position = u.position + u_ins;
        }
    }
}

/// The inverse of `t` against the text it was applied to: applying `t` to
/// `content` and then the inverse returns `content`.
///
/// Fails when `t` does not fit `content`, same as [`apply`].
pub fn invert(content: &str, t: &Transform) -> Result<Transform, OtError> {
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    if t.position > len || t.position + t.delete > len {
        return Err(OtError::InvalidTransform {
            position: t.position,
            delete: t.delete,
            len,
        });
    }

    Ok(Transform {
        position: t.position,
        delete: t.insert_len(),
        insert: chars[t.position..t.position + t.delete].iter().collect(),
        version: t.version,
    })
}
