//! NAR encoder for building test archives

use std::collections::BTreeMap;

pub enum Tree {
    File { executable: bool, contents: Vec<u8> },
    Dir(BTreeMap<String, Tree>),
    Link(String),
}

impl Tree {
    pub fn file(contents: &[u8]) -> Self {
        Self::File {
            executable: false,
            contents: contents.to_vec(),
        }
    }

    pub fn exe(contents: &[u8]) -> Self {
        Self::File {
            executable: true,
            contents: contents.to_vec(),
        }
    }

    pub fn link(target: &str) -> Self {
        Self::Link(target.to_string())
    }

    pub fn dir<const N: usize>(entries: [(&str, Tree); N]) -> Self {
        Self::Dir(
            entries
                .into_iter()
                .map(|(name, tree)| (name.to_string(), tree))
                .collect(),
        )
    }
}

pub struct NarBuilder {
    out: Vec<u8>,
}

impl NarBuilder {
    pub fn encode(tree: &Tree) -> Vec<u8> {
        let mut builder = Self { out: Vec::new() };
        builder.str(b"nix-archive-1");
        builder.node(tree);
        builder.out
    }

    fn str(&mut self, s: &[u8]) {
        self.out.extend_from_slice(&(s.len() as u64).to_le_bytes());
        self.out.extend_from_slice(s);
        let pad = (8 - s.len() % 8) % 8;
        self.out.extend(std::iter::repeat(0u8).take(pad));
    }

    fn node(&mut self, tree: &Tree) {
        self.str(b"(");
        self.str(b"type");
        match tree {
            Tree::File {
                executable,
                contents,
            } => {
                self.str(b"regular");
                if *executable {
                    self.str(b"executable");
                    self.str(b"");
                }
                self.str(b"contents");
                self.str(contents);
            }
            Tree::Dir(entries) => {
                self.str(b"directory");
                for (name, child) in entries {
                    self.str(b"entry");
                    self.str(b"(");
                    self.str(b"name");
                    self.str(name.as_bytes());
                    self.str(b"node");
                    self.node(child);
                    self.str(b")");
                }
            }
            Tree::Link(target) => {
                self.str(b"symlink");
                self.str(b"target");
                self.str(target.as_bytes());
            }
        }
        self.str(b")");
    }
}
