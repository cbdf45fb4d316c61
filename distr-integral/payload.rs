//! Wire payload layout for the integration example application: big-endian IEEE 754
//! floats throughout, per
//! `examples/original_source/include/distr.h`'s `job_cfg_t` and the manager/worker
//! loops that serialize it.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor};

/// `HELLO = { cores: u32 be }`
pub fn encode_hello(cores: u32, out: &mut [u8]) -> io::Result<usize> {
    let mut w = &mut out[..4];
    w.write_u32::<BigEndian>(cores)?;
    Ok(4)
}

pub fn decode_hello(payload: &[u8]) -> io::Result<u32> {
    Cursor::new(payload).read_u32::<BigEndian>()
}

/// `TASK = { id: u32 be, a: f64 be, b: f64 be, n: u64 be, threads: u32 be }`
pub struct Task {
    pub id: u32,
    pub a: f64,
    pub b: f64,
    pub n: u64,
    pub threads: u32,
}

pub fn encode_task(task: &Task, out: &mut [u8]) -> io::Result<usize> {
    let mut w = &mut out[..28];
    w.write_u32::<BigEndian>(task.id)?;
    w.write_f64::<BigEndian>(task.a)?;
    w.write_f64::<BigEndian>(task.b)?;
    w.write_u64::<BigEndian>(task.n)?;
    w.write_u32::<BigEndian>(task.threads)?;
    Ok(28)
}

pub fn decode_task(payload: &[u8]) -> io::Result<Task> {
    let mut c = Cursor::new(payload);
    Ok(Task {
        id: c.read_u32::<BigEndian>()?,
        a: c.read_f64::<BigEndian>()?,
        b: c.read_f64::<BigEndian>()?,
        n: c.read_u64::<BigEndian>()?,
        threads: c.read_u32::<BigEndian>()?,
    })
}

/// `RESULT = { id: u32 be, value: f64 be }`
pub fn encode_result(id: u32, value: f64, out: &mut [u8]) -> io::Result<usize> {
    let mut w = &mut out[..12];
    w.write_u32::<BigEndian>(id)?;
    w.write_f64::<BigEndian>(value)?;
    Ok(12)
}

pub fn decode_result(payload: &[u8]) -> io::Result<(u32, f64)> {
    let mut c = Cursor::new(payload);
    Ok((c.read_u32::<BigEndian>()?, c.read_f64::<BigEndian>()?))
}
