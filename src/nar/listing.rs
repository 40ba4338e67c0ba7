//! NAR indexing
//!
//! A NAR is a sequence of length-prefixed strings (u64 little endian length,
//! bytes, zero padding to a multiple of 8). Indexing walks the grammar once,
//! records where every regular file's contents start, and seeks over the
//! contents themselves so building the tree costs one pass over the headers.

use crate::error::{CacheFsError, CacheFsResult};
use std::collections::{BTreeMap, VecDeque};
use std::io::{BufReader, Read, Seek};

const NAR_MAGIC: &str = "nix-archive-1";
const MAX_NAME_LEN: u64 = 255;
const MAX_TARGET_LEN: u64 = 4096;
const MAX_TOKEN_LEN: u64 = 64;
const MAX_DEPTH: usize = 256;
const MAX_SYMLINK_HOPS: usize = 40;

/// One node of the archive tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarNode {
    Regular {
        executable: bool,
        size: u64,
        /// Offset of the first content byte within the archive
        offset: u64,
    },
    Directory {
        entries: BTreeMap<String, NarNode>,
    },
    Symlink {
        target: String,
    },
}

impl NarNode {
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}

/// A node found by path lookup
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub node: &'a NarNode,
    /// Final component name, `.` for the archive root
    pub name: &'a str,
}

/// Index over a NAR's contents
#[derive(Debug, Clone)]
pub struct NarListing {
    root: NarNode,
}

impl NarListing {
    /// Index the archive readable from `reader`, starting at its current position
    pub fn parse<R: Read + Seek>(reader: R) -> CacheFsResult<Self> {
        let mut parser = Parser::new(reader)?;
        parser.expect(NAR_MAGIC)?;
        let root = parser.node(0)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &NarNode {
        &self.root
    }

    /// Find the node at a `/`-separated path relative to the archive root
    ///
    /// Relative symlinks are followed, including a final one. A link that
    /// points outside the archive cannot be followed.
    pub fn lookup<'a>(&'a self, path: &str) -> CacheFsResult<Located<'a>> {
        let mut pending: VecDeque<String> = components(path).collect();
        let mut chain: Vec<(&'a str, &'a NarNode)> = vec![(".", &self.root)];
        let mut hops = 0;

        while let Some(component) = pending.pop_front() {
            if component == ".." {
                if chain.len() == 1 {
                    return Err(CacheFsError::NotFound(format!("{}: escapes archive root", path)));
                }
                chain.pop();
                continue;
            }

            let (_, parent) = chain[chain.len() - 1];
            let NarNode::Directory { entries } = parent else {
                return Err(CacheFsError::NotADirectory(path.to_string()));
            };
            let Some((name, child)) = entries.get_key_value(component.as_str()) else {
                return Err(CacheFsError::NotFound(path.to_string()));
            };

            if let NarNode::Symlink { target } = child {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(CacheFsError::archive(format!(
                        "too many levels of symbolic links resolving {}",
                        path
                    )));
                }
                if target.starts_with('/') {
                    return Err(CacheFsError::UnsupportedOperation {
                        op: "follow symlink outside archive",
                        path: format!("{} -> {}", path, target),
                    });
                }
                for (idx, part) in components(target).enumerate() {
                    pending.insert(idx, part);
                }
                continue;
            }

            chain.push((name.as_str(), child));
        }

        let (name, node) = chain[chain.len() - 1];
        Ok(Located { node, name })
    }
}

fn components(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(str::to_string)
}

struct Parser<R> {
    inner: BufReader<R>,
    pos: u64,
}

impl<R: Read + Seek> Parser<R> {
    fn new(mut reader: R) -> CacheFsResult<Self> {
        let pos = reader
            .stream_position()
            .map_err(|e| CacheFsError::io("locating archive start", e))?;
        Ok(Self {
            inner: BufReader::new(reader),
            pos,
        })
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> CacheFsResult<()> {
        self.inner.read_exact(buf).map_err(|e| {
            CacheFsError::archive(format!("truncated at offset {}: {}", self.pos, e))
        })?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn u64(&mut self) -> CacheFsResult<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn padding(&mut self, len: u64) -> CacheFsResult<()> {
        let pad = padding(len);
        if pad > 0 {
            let mut buf = [0u8; 8];
            self.read_exact(&mut buf[..pad])?;
            if buf[..pad].iter().any(|b| *b != 0) {
                return Err(CacheFsError::archive(format!(
                    "non-zero padding before offset {}",
                    self.pos
                )));
            }
        }
        Ok(())
    }

    fn string(&mut self, max_len: u64) -> CacheFsResult<String> {
        let len = self.u64()?;
        if len > max_len {
            return Err(CacheFsError::archive(format!(
                "string of {} bytes at offset {} exceeds limit {}",
                len, self.pos, max_len
            )));
        }
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf)?;
        self.padding(len)?;
        String::from_utf8(buf)
            .map_err(|_| CacheFsError::archive(format!("non UTF-8 string before offset {}", self.pos)))
    }

    fn token(&mut self) -> CacheFsResult<String> {
        self.string(MAX_TOKEN_LEN)
    }

    fn expect(&mut self, expected: &str) -> CacheFsResult<()> {
        let got = self.string(MAX_TOKEN_LEN.max(expected.len() as u64))?;
        if got != expected {
            return Err(CacheFsError::archive(format!(
                "expected {:?}, found {:?} before offset {}",
                expected, got, self.pos
            )));
        }
        Ok(())
    }

    fn skip(&mut self, len: u64) -> CacheFsResult<()> {
        let offset = i64::try_from(len)
            .map_err(|_| CacheFsError::archive(format!("file of {} bytes is too large", len)))?;
        self.inner
            .seek_relative(offset)
            .map_err(|e| CacheFsError::io("skipping file contents", e))?;
        self.pos += len;
        Ok(())
    }

    fn node(&mut self, depth: usize) -> CacheFsResult<NarNode> {
        if depth > MAX_DEPTH {
            return Err(CacheFsError::archive("directory nesting too deep"));
        }
        self.expect("(")?;
        self.expect("type")?;

        let node = match self.token()?.as_str() {
            "regular" => {
                let mut executable = false;
                let mut tag = self.token()?;
                if tag == "executable" {
                    self.expect("")?;
                    executable = true;
                    tag = self.token()?;
                }
                if tag != "contents" {
                    return Err(CacheFsError::archive(format!(
                        "expected \"contents\", found {:?}",
                        tag
                    )));
                }
                let size = self.u64()?;
                let offset = self.pos;
                let padded = size.checked_add(padding(size) as u64).ok_or_else(|| {
                    CacheFsError::archive(format!("file of {} bytes is too large", size))
                })?;
                self.skip(padded)?;
                self.expect(")")?;
                NarNode::Regular {
                    executable,
                    size,
                    offset,
                }
            }
            "symlink" => {
                self.expect("target")?;
                let target = self.string(MAX_TARGET_LEN)?;
                self.expect(")")?;
                NarNode::Symlink { target }
            }
            "directory" => {
                let mut entries = BTreeMap::new();
                let mut previous: Option<String> = None;
                loop {
                    match self.token()?.as_str() {
                        ")" => break,
                        "entry" => {}
                        other => {
                            return Err(CacheFsError::archive(format!(
                                "expected \"entry\" or \")\", found {:?}",
                                other
                            )))
                        }
                    }
                    self.expect("(")?;
                    self.expect("name")?;
                    let name = self.string(MAX_NAME_LEN)?;
                    validate_name(&name, previous.as_deref())?;
                    self.expect("node")?;
                    let child = self.node(depth + 1)?;
                    self.expect(")")?;
                    previous = Some(name.clone());
                    entries.insert(name, child);
                }
                NarNode::Directory { entries }
            }
            other => {
                return Err(CacheFsError::archive(format!("unknown node type {:?}", other)));
            }
        };
        Ok(node)
    }
}

fn padding(len: u64) -> usize {
    ((8 - len % 8) % 8) as usize
}

fn validate_name(name: &str, previous: Option<&str>) -> CacheFsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(CacheFsError::archive(format!("invalid entry name {:?}", name)));
    }
    if let Some(previous) = previous {
        if name <= previous {
            return Err(CacheFsError::archive(format!(
                "entry {:?} is not sorted after {:?}",
                name, previous
            )));
        }
    }
    Ok(())
}
