#![allow(clippy::missing_safety_doc)]

use std::ptr;

use proba_accum_core::{Accumulation, AccumulatorCfg, AccumError, Scoring, WindowMode};
use proba_accum_supervisor::{
    AccumulatorSupervisor, ControlRecord, ModelRecord, OutputEvent, SupervisorError,
    SupervisorSnapshot,
};

/// FFI ABI version for proba_accum_ffi.
///
/// Bump this when any `#[repr(C)]` struct layout or exported function signature changes.
pub const PROBA_ACCUM_FFI_VERSION: u32 = 1;

#[no_mangle]
pub extern "C" fn proba_accum_ffi_version() -> u32 {
    PROBA_ACCUM_FFI_VERSION
}

// Snapshot wire format identification.
const SNAP_MAGIC: u32 = 0x3143_4150; // "PAC1" little-endian
const SNAP_VERSION: u32 = 1;
const SNAP_HEADER_LEN: usize = 12;

// Return codes.
pub const PA_OK: i32 = 0;
/// Record accepted but not scored this step (degenerate accumulation, too few classes).
pub const PA_SKIPPED: i32 = 1;
pub const PA_ERR_NULL: i32 = -1;
pub const PA_ERR_UTF8: i32 = -2;
pub const PA_ERR_UNKNOWN_SOURCE: i32 = -3;
pub const PA_ERR_DUPLICATE_SOURCE: i32 = -4;
pub const PA_ERR_CONFIG: i32 = -5;
pub const PA_ERR_REJECTED: i32 = -6;
pub const PA_ERR_SERIALIZE: i32 = -7;
pub const PA_ERR_BAD_MAGIC: i32 = -8;
pub const PA_ERR_BAD_VERSION: i32 = -9;
pub const PA_ERR_TRUNCATED: i32 = -10;
/// A decision was made but its target class does not fit the FFI field.
pub const PA_ERR_RANGE: i32 = -11;

/// Opaque handle exposed over FFI.
#[repr(C)]
pub struct PaSupervisor {
    inner: AccumulatorSupervisor,
}

/// FFI string view (UTF-8 bytes).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PaStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl PaStr {
    fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        std::str::from_utf8(bytes).ok()
    }

    fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

/// Owned byte buffer (JSON events, snapshots).
#[repr(C)]
pub struct PaBytes {
    pub ptr: *mut u8,
    pub len: usize,
}

impl PaBytes {
    fn empty() -> Self {
        PaBytes { ptr: ptr::null_mut(), len: 0 }
    }

    fn from_vec(buf: Vec<u8>) -> Self {
        let mut boxed = buf.into_boxed_slice();
        let ptr = boxed.as_mut_ptr();
        let len = boxed.len();
        // Leaked to caller; freed by proba_accum_bytes_free
        std::mem::forget(boxed);
        PaBytes { ptr, len }
    }
}

/// JSON-encoded output events plus a return code.
#[repr(C)]
pub struct PaEvents {
    pub rc: i32,
    /// JSON array of `{"label": ..., "data": ...}` objects; null on error.
    pub json: PaBytes,
}

/// Accumulator cfg for FFI (keep it minimal).
///
/// The class subset for recovery is not representable here; set it with a
/// `reset_{source}_accumulation` control record.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PaCfg {
    /// 0 = mean, 1 = bayesian.
    pub accumulation: u8,
    /// 0 = ratio, 1 = highest, 2 = iteration.
    pub scoring: u8,
    pub threshold: f64,
    pub min_buffer_size: u32,
    pub max_buffer_size: u32,
    /// Milliseconds; `<= 0` disables the cooldown.
    pub recovery_ms: i64,
    /// 1 = sliding window (default), 0 = fixed.
    pub sliding_window: u8,
    pub feedback: u8,
}

/// Outcome of submitting one probability vector.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct PaSubmitResult {
    pub rc: i32,
    pub decided: u8,
    pub target: u32,
    pub score: f64,
    pub iterations: u64,
    pub timestamp_us: i64,
}

impl PaSubmitResult {
    fn with_rc(rc: i32) -> Self {
        PaSubmitResult {
            rc,
            decided: 0,
            target: 0,
            score: 0.0,
            iterations: 0,
            timestamp_us: 0,
        }
    }
}

/// Restore result statistics (FFI-safe).
#[repr(C)]
pub struct PaRestoreStats {
    pub applied: u32,
    pub overwritten: u32,
    pub skipped: u32,
    pub rc: i32,
}

#[no_mangle]
pub extern "C" fn proba_accum_cfg_default() -> PaCfg {
    let d = AccumulatorCfg::default();
    PaCfg {
        accumulation: match d.accumulation {
            Accumulation::Mean => 0,
            Accumulation::Bayesian => 1,
        },
        scoring: match d.scoring {
            Scoring::Ratio => 0,
            Scoring::Highest => 1,
            Scoring::Iteration => 2,
        },
        threshold: d.threshold,
        min_buffer_size: d.min_buffer_size as u32,
        max_buffer_size: d.max_buffer_size as u32,
        recovery_ms: d.recovery,
        sliding_window: if d.recovery_window == WindowMode::Sliding { 1 } else { 0 },
        feedback: if d.feedback { 1 } else { 0 },
    }
}

fn cfg_from_ffi(c: PaCfg, source: &str) -> Option<AccumulatorCfg> {
    let accumulation = match c.accumulation {
        0 => Accumulation::Mean,
        1 => Accumulation::Bayesian,
        _ => return None,
    };
    let scoring = match c.scoring {
        0 => Scoring::Ratio,
        1 => Scoring::Highest,
        2 => Scoring::Iteration,
        _ => return None,
    };
    Some(AccumulatorCfg {
        accumulation,
        scoring,
        threshold: c.threshold,
        min_buffer_size: c.min_buffer_size as usize,
        max_buffer_size: c.max_buffer_size as usize,
        recovery: c.recovery_ms,
        recovery_window: if c.sliding_window != 0 { WindowMode::Sliding } else { WindowMode::Fixed },
        feedback: c.feedback != 0,
        classes: None,
        source: source.to_string(),
    })
}

fn err_code(e: &SupervisorError) -> i32 {
    match e {
        SupervisorError::UnknownSource { .. } => PA_ERR_UNKNOWN_SOURCE,
        SupervisorError::DuplicateSource { .. } => PA_ERR_DUPLICATE_SOURCE,
        SupervisorError::Config(_) => PA_ERR_CONFIG,
        SupervisorError::Accumulation(a) if !a.is_fatal_for_record() => PA_SKIPPED,
        _ => PA_ERR_REJECTED,
    }
}

fn target_u32(target: usize) -> Result<u32, i32> {
    u32::try_from(target).map_err(|_| PA_ERR_RANGE)
}

fn events_json(events: &[OutputEvent], rc: i32) -> PaEvents {
    match serde_json::to_vec(events) {
        Ok(buf) => PaEvents { rc, json: PaBytes::from_vec(buf) },
        Err(_) => PaEvents { rc: PA_ERR_SERIALIZE, json: PaBytes::empty() },
    }
}

/// Create a new, empty supervisor handle.
///
/// This library does not spawn threads and the handle is not synchronized:
/// drive it from one thread at a time.
#[no_mangle]
pub extern "C" fn proba_accum_supervisor_new() -> *mut PaSupervisor {
    let handle = PaSupervisor {
        inner: AccumulatorSupervisor::new(),
    };
    Box::into_raw(Box::new(handle))
}

#[no_mangle]
pub unsafe extern "C" fn proba_accum_supervisor_free(h: *mut PaSupervisor) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

/// Register an accumulator for `source`.
#[no_mangle]
pub unsafe extern "C" fn proba_accum_add_source(h: *mut PaSupervisor, source: PaStr, cfg: PaCfg) -> i32 {
    if h.is_null() {
        return PA_ERR_NULL;
    }
    let handle = &mut *h;
    let source = match source.as_str() { Some(s) => s, None => return PA_ERR_UTF8 };
    let cfg = match cfg_from_ffi(cfg, source) { Some(c) => c, None => return PA_ERR_CONFIG };
    match handle.inner.add(cfg) {
        Ok(()) => PA_OK,
        Err(e) => err_code(&e),
    }
}

/// Fold one probability vector taken at `timestamp_us` into `source`.
#[no_mangle]
pub unsafe extern "C" fn proba_accum_submit(
    h: *mut PaSupervisor,
    source: PaStr,
    probs_ptr: *const f64,
    probs_len: usize,
    timestamp_us: i64,
) -> PaSubmitResult {
    if h.is_null() || probs_ptr.is_null() {
        return PaSubmitResult::with_rc(PA_ERR_NULL);
    }
    let handle = &mut *h;
    let source = match source.as_str() { Some(s) => s, None => return PaSubmitResult::with_rc(PA_ERR_UTF8) };
    let probs = std::slice::from_raw_parts(probs_ptr, probs_len).to_vec();

    match handle.inner.submit(source, probs, timestamp_us) {
        Ok(step) => match step.decision {
            Some(d) => {
                let (rc, target) = match target_u32(d.target) {
                    Ok(t) => (PA_OK, t),
                    Err(rc) => (rc, u32::MAX),
                };
                PaSubmitResult {
                    rc,
                    decided: 1,
                    target,
                    score: d.score,
                    iterations: d.iterations,
                    timestamp_us: d.timestamp,
                }
            }
            None => {
                let rc = match step.skipped {
                    Some(AccumError::InsufficientClasses { .. }) => PA_SKIPPED,
                    _ => PA_OK,
                };
                PaSubmitResult::with_rc(rc)
            }
        },
        Err(e) => PaSubmitResult::with_rc(err_code(&e)),
    }
}

/// Fold one classifier record (`ready` / `predict_proba`) into `source`.
///
/// `data` may be null. `onset_us` is used when `has_onset != 0`.
/// Returns the produced events as JSON; on rejection, `rc` is negative and
/// `json` still holds any events the call produced.
#[no_mangle]
pub unsafe extern "C" fn proba_accum_ingest(
    h: *mut PaSupervisor,
    source: PaStr,
    label: PaStr,
    data: PaStr,
    timestamp_us: i64,
    has_onset: u8,
    onset_us: i64,
) -> PaEvents {
    if h.is_null() {
        return PaEvents { rc: PA_ERR_NULL, json: PaBytes::empty() };
    }
    let handle = &mut *h;
    let (source, label) = match (source.as_str(), label.as_str()) {
        (Some(s), Some(l)) => (s, l),
        _ => return PaEvents { rc: PA_ERR_UTF8, json: PaBytes::empty() },
    };
    let data = if data.is_null() {
        None
    } else {
        match data.as_str() {
            Some(d) => Some(d.to_string()),
            None => return PaEvents { rc: PA_ERR_UTF8, json: PaBytes::empty() },
        }
    };

    let record = ModelRecord {
        timestamp_us,
        label: label.to_string(),
        data,
        onset_us: if has_onset != 0 { Some(onset_us) } else { None },
    };

    match handle.inner.ingest(source, std::slice::from_ref(&record)) {
        Ok(events) => events_json(&events, PA_OK),
        Err(SupervisorError::Rejected { events, .. }) => events_json(&events, PA_ERR_REJECTED),
        Err(e) => PaEvents { rc: err_code(&e), json: PaBytes::empty() },
    }
}

/// Apply one control record (`reset_{source}_accumulation` / `get_{source}_accumulation`).
///
/// Unknown labels and malformed settings are ignored; `rc` is still 0.
/// Settings bytes that are not UTF-8 return `PA_ERR_UTF8` without touching any accumulator.
#[no_mangle]
pub unsafe extern "C" fn proba_accum_control(h: *mut PaSupervisor, label: PaStr, data: PaStr) -> PaEvents {
    if h.is_null() {
        return PaEvents { rc: PA_ERR_NULL, json: PaBytes::empty() };
    }
    let handle = &mut *h;
    let label = match label.as_str() { Some(l) => l, None => return PaEvents { rc: PA_ERR_UTF8, json: PaBytes::empty() } };
    let data = if data.is_null() {
        None
    } else {
        match data.as_str() {
            Some(d) => Some(d.to_string()),
            None => return PaEvents { rc: PA_ERR_UTF8, json: PaBytes::empty() },
        }
    };

    let events = handle.inner.handle_control(&[ControlRecord::new(0, label, data)]);
    events_json(&events, PA_OK)
}

/// Current configuration of `source` as a JSON object.
#[no_mangle]
pub unsafe extern "C" fn proba_accum_describe(h: *mut PaSupervisor, source: PaStr) -> PaEvents {
    if h.is_null() {
        return PaEvents { rc: PA_ERR_NULL, json: PaBytes::empty() };
    }
    let handle = &*h;
    let source = match source.as_str() { Some(s) => s, None => return PaEvents { rc: PA_ERR_UTF8, json: PaBytes::empty() } };
    let acc = match handle.inner.get(source) {
        Some(a) => a,
        None => return PaEvents { rc: PA_ERR_UNKNOWN_SOURCE, json: PaBytes::empty() },
    };
    match serde_json::to_vec(&acc.describe()) {
        Ok(buf) => PaEvents { rc: PA_OK, json: PaBytes::from_vec(buf) },
        Err(_) => PaEvents { rc: PA_ERR_SERIALIZE, json: PaBytes::empty() },
    }
}

#[no_mangle]
pub unsafe extern "C" fn proba_accum_bytes_free(b: PaBytes) {
    if !b.ptr.is_null() {
        let slice_ptr = std::ptr::slice_from_raw_parts_mut(b.ptr, b.len);
        drop(Box::from_raw(slice_ptr));
    }
}

/// Snapshot format (binary):
/// [u32 magic = "PAC1"][u32 version = 1][u32 body_len][body_len bytes of JSON]
///
/// The JSON body lists every accumulator configuration, sorted by source.
#[no_mangle]
pub unsafe extern "C" fn proba_accum_snapshot(h: *mut PaSupervisor) -> PaBytes {
    if h.is_null() {
        return PaBytes::empty();
    }
    let handle = &*h;
    let body = match serde_json::to_vec(&handle.inner.snapshot()) {
        Ok(b) => b,
        Err(_) => return PaBytes::empty(),
    };

    let mut buf: Vec<u8> = Vec::with_capacity(SNAP_HEADER_LEN + body.len());
    buf.extend_from_slice(&SNAP_MAGIC.to_le_bytes());
    buf.extend_from_slice(&SNAP_VERSION.to_le_bytes());
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(&body);

    PaBytes::from_vec(buf)
}

fn decode_snapshot(data: &[u8]) -> Result<SupervisorSnapshot, i32> {
    let read_u32 = |at: usize| -> Option<u32> {
        let b = data.get(at..at + 4)?;
        Some(u32::from_le_bytes(b.try_into().ok()?))
    };

    let magic = read_u32(0).ok_or(PA_ERR_TRUNCATED)?;
    if magic != SNAP_MAGIC {
        return Err(PA_ERR_BAD_MAGIC);
    }
    let ver = read_u32(4).ok_or(PA_ERR_TRUNCATED)?;
    if ver != SNAP_VERSION {
        return Err(PA_ERR_BAD_VERSION);
    }
    let body_len = read_u32(8).ok_or(PA_ERR_TRUNCATED)? as usize;
    let end = SNAP_HEADER_LEN.checked_add(body_len).ok_or(PA_ERR_TRUNCATED)?;
    let body = data.get(SNAP_HEADER_LEN..end).ok_or(PA_ERR_TRUNCATED)?;
    serde_json::from_slice(body).map_err(|_| PA_ERR_CONFIG)
}

/// Restore accumulators from a snapshot. `merge != 0` keeps sources absent from it.
#[no_mangle]
pub unsafe extern "C" fn proba_accum_restore(
    h: *mut PaSupervisor,
    bytes: *const u8,
    len: usize,
    merge: u8,
) -> PaRestoreStats {
    if h.is_null() || bytes.is_null() {
        return PaRestoreStats { applied: 0, overwritten: 0, skipped: 0, rc: PA_ERR_NULL };
    }
    let handle = &mut *h;
    let data = std::slice::from_raw_parts(bytes, len);

    let snap = match decode_snapshot(data) {
        Ok(s) => s,
        Err(rc) => return PaRestoreStats { applied: 0, overwritten: 0, skipped: 0, rc },
    };

    let stats = if merge != 0 {
        handle.inner.restore_merge(snap)
    } else {
        handle.inner.restore(snap)
    };

    PaRestoreStats {
        applied: stats.applied as u32,
        overwritten: stats.overwritten as u32,
        skipped: stats.skipped as u32,
        rc: PA_OK,
    }
}
