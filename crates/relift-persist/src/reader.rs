//! The two-pass XML reader.
//!
//! The reader is an explicit pushdown automaton over the parser's event
//! stream: element starts push a [`Context`], element ends pop it and
//! hand it to the parent's add-child routine, dispatched through the
//! declarative tag table in [`crate::tags`]. The stack height always
//! equals the element depth.
//!
//! Loading runs the automaton twice over the same files:
//!
//! * **Phase 0** constructs every object from its element's own
//!   attributes and records `id -> handle` in the id table. At the end
//!   the IR is structurally complete, but every cross-reference (edges,
//!   `Ref` definitions, caller sets, entry/exit blocks, ...) is still
//!   unresolved.
//! * **Phase 1** re-walks the files. Reference attributes resolve through
//!   the id table -- an unknown id is fatal -- and the referencing
//!   objects are patched: procedure and CFG links directly, statements by
//!   rebuilding their expression trees with references resolved and
//!   overwriting the statement in place.
//!
//! Unknown tags are recorded once and their subtrees ignored; character
//! data outside text-bearing elements draws a warning, since the format
//! carries no freeform text.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use relift_core::{
    BasicBlock, BbId, ClusterId, CoreError, Exp, Operator, ProcId, Program, Rtl, Signature,
    Statement, StmtId, Type, UserProc,
};

use crate::error::PersistError;
use crate::ids::IdTable;
use crate::tags::{tag_index, TAGS, UNKNOWN_TAG};

/// Attributes of one element, unescaped.
pub struct AttrMap {
    map: HashMap<String, String>,
    tag: String,
}

impl AttrMap {
    fn from_start(tag: &str, e: &BytesStart) -> Result<AttrMap, PersistError> {
        let mut map = HashMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| PersistError::MalformedAttr {
                attr: tag.to_string(),
                value: err.to_string(),
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| PersistError::MalformedAttr {
                    attr: key.clone(),
                    value: err.to_string(),
                })?
                .into_owned();
            map.insert(key, value);
        }
        Ok(AttrMap {
            map,
            tag: tag.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(|s| s.as_str())
    }

    pub fn req(&self, name: &str) -> Result<&str, PersistError> {
        self.get(name).ok_or_else(|| PersistError::MissingAttr {
            tag: self.tag.clone(),
            attr: name.to_string(),
        })
    }

    fn parse<T: std::str::FromStr>(&self, name: &str, value: &str) -> Result<T, PersistError> {
        value.parse().map_err(|_| PersistError::MalformedAttr {
            attr: name.to_string(),
            value: value.to_string(),
        })
    }

    pub fn u32(&self, name: &str) -> Result<u32, PersistError> {
        self.parse(name, self.req(name)?)
    }

    pub fn opt_u32(&self, name: &str) -> Result<Option<u32>, PersistError> {
        self.get(name)
            .map(|v| self.parse(name, v))
            .transpose()
    }

    pub fn i32(&self, name: &str) -> Result<i32, PersistError> {
        self.parse(name, self.req(name)?)
    }

    pub fn opt_i32(&self, name: &str) -> Result<Option<i32>, PersistError> {
        self.get(name)
            .map(|v| self.parse(name, v))
            .transpose()
    }

    pub fn i64(&self, name: &str) -> Result<i64, PersistError> {
        self.parse(name, self.req(name)?)
    }

    pub fn u16(&self, name: &str) -> Result<u16, PersistError> {
        self.parse(name, self.req(name)?)
    }

    pub fn f64(&self, name: &str) -> Result<f64, PersistError> {
        self.parse(name, self.req(name)?)
    }

    pub fn bool(&self, name: &str) -> Result<bool, PersistError> {
        Ok(self.i32(name)? != 0)
    }

    pub fn op(&self, name: &str) -> Result<Operator, PersistError> {
        let raw = self.req(name)?;
        Operator::from_name(raw).ok_or_else(|| PersistError::UnknownOperator(raw.to_string()))
    }
}

/// One frame of the parse stack; slots for every partially-built shape.
#[derive(Default)]
pub struct Context {
    pub tag: usize,
    pub exp: Option<Exp>,
    pub exp2: Option<Exp>,
    pub ty: Option<Type>,
    pub stmt: Option<Statement>,
    pub sig: Option<Signature>,
    pub rtl: Option<Rtl>,
    pub name: String,
    pub int: i64,
    /// This element's own (or enclosing) procedure.
    pub proc: Option<ProcId>,
    pub cluster: Option<ClusterId>,
    /// This element's own basic block.
    pub bb: Option<BbId>,
    /// A referenced procedure (callee links, call destinations).
    pub ref_proc: Option<ProcId>,
    /// A referenced basic block (edges, orderings, phi arguments).
    pub ref_bb: Option<BbId>,
    /// A referenced statement (caller links, phi arguments).
    pub ref_stmt: Option<StmtId>,
    /// Phase-1 positional cursors.
    pub rtl_index: usize,
    pub stmt_index: usize,
}

impl Context {
    pub fn new(tag: usize) -> Context {
        Context {
            tag,
            ..Context::default()
        }
    }
}

/// The reader state shared by all tag handlers.
pub struct XmlProgReader {
    pub phase: u8,
    pub prog: Option<Program>,
    pub ids: IdTable,
    pub stack: Vec<Context>,
    unknown_tags: BTreeSet<String>,
    current_file: String,
}

/// Loads a program from its root cluster file, then from each child
/// cluster's file, twice (construction, then reference patching).
pub fn load(root_file: &Path) -> Result<Program, PersistError> {
    let mut rd = XmlProgReader {
        phase: 0,
        prog: None,
        ids: IdTable::new(),
        stack: Vec::new(),
        unknown_tags: BTreeSet::new(),
        current_file: String::new(),
    };
    let base = root_file.parent().unwrap_or_else(|| Path::new("."));
    for phase in 0..2u8 {
        rd.phase = phase;
        rd.parse_file(root_file)?;
        let root = rd
            .prog
            .as_ref()
            .ok_or_else(|| PersistError::NoProg(root_file.display().to_string()))?
            .root_cluster();
        rd.parse_children(base, root)?;
    }
    let prog = rd
        .prog
        .take()
        .ok_or_else(|| PersistError::NoProg(root_file.display().to_string()))?;
    prog.check_ref_integrity()?;
    Ok(prog)
}

impl XmlProgReader {
    fn parse_children(&mut self, dir: &Path, cluster: ClusterId) -> Result<(), PersistError> {
        let (name, children) = {
            let prog = self.prog.as_ref().expect("program exists during parse");
            let c = prog
                .cluster(cluster)
                .ok_or(CoreError::ClusterNotFound { id: cluster })?;
            (c.name.clone(), c.children.clone())
        };
        let my_dir = dir.join(&name);
        for child in children {
            let child_name = {
                let prog = self.prog.as_ref().expect("program exists during parse");
                prog.cluster(child)
                    .ok_or(CoreError::ClusterNotFound { id: child })?
                    .name
                    .clone()
            };
            let file = my_dir.join(format!("{}.xml", child_name));
            self.parse_file(&file)?;
            self.parse_children(&my_dir, child)?;
        }
        Ok(())
    }

    fn parse_file(&mut self, path: &Path) -> Result<(), PersistError> {
        self.current_file = path.display().to_string();
        self.stack.clear();
        let mut reader = Reader::from_file(path).map_err(|err| PersistError::Xml {
            file: path.display().to_string(),
            pos: 0,
            msg: err.to_string(),
        })?;
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let attrs = AttrMap::from_start(&tag, &e)?;
                    self.handle_start(&tag, &attrs)?;
                }
                Ok(Event::Empty(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let attrs = AttrMap::from_start(&tag, &e)?;
                    self.handle_start(&tag, &attrs)?;
                    self.handle_end()?;
                }
                Ok(Event::End(_)) => self.handle_end()?,
                Ok(Event::Text(t)) => {
                    let text = t.unescape().unwrap_or_default();
                    if !text.trim().is_empty() {
                        warn!(
                            file = %self.current_file,
                            "unexpected character data in document: {:?}",
                            text.trim()
                        );
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(PersistError::Xml {
                        file: self.current_file.clone(),
                        pos: reader.buffer_position(),
                        msg: err.to_string(),
                    })
                }
            }
            buf.clear();
        }
        Ok(())
    }

    fn handle_start(&mut self, tag: &str, attrs: &AttrMap) -> Result<(), PersistError> {
        match tag_index(tag) {
            Some(i) => {
                let mut ctx = Context::new(i);
                (TAGS[i].start)(self, &mut ctx, attrs)?;
                self.stack.push(ctx);
            }
            None => {
                if self.unknown_tags.insert(tag.to_string()) {
                    warn!(file = %self.current_file, "unknown tag <{}>", tag);
                }
                self.stack.push(Context::new(UNKNOWN_TAG));
            }
        }
        Ok(())
    }

    fn handle_end(&mut self) -> Result<(), PersistError> {
        let child = match self.stack.pop() {
            Some(c) => c,
            None => return Ok(()),
        };
        if let Some(mut parent) = self.stack.pop() {
            if parent.tag != UNKNOWN_TAG && child.tag != UNKNOWN_TAG {
                (TAGS[parent.tag].add_child)(self, &mut parent, child)?;
            }
            self.stack.push(parent);
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Helpers shared by the tag handlers
    // -----------------------------------------------------------------

    pub fn prog_mut(&mut self) -> Result<&mut Program, PersistError> {
        self.prog
            .as_mut()
            .ok_or_else(|| PersistError::NoProg(self.current_file.clone()))
    }

    /// The procedure owning the innermost open element that carries one.
    pub fn enclosing_proc(&self) -> Option<ProcId> {
        self.stack.iter().rev().find_map(|c| c.proc)
    }

    pub fn user_mut(&mut self, pid: ProcId) -> Result<&mut UserProc, PersistError> {
        let prog = self.prog_mut()?;
        prog.proc_mut(pid)
            .and_then(|p| p.as_user_mut())
            .ok_or(PersistError::Core(
                CoreError::ProcNotFound { id: pid },
            ))
    }

    pub fn bb_mut(
        &mut self,
        pid: ProcId,
        bb: BbId,
    ) -> Result<&mut BasicBlock, PersistError> {
        self.user_mut(pid)?
            .cfg
            .block_mut(bb)
            .ok_or(PersistError::Core(CoreError::BbNotFound {
                id: bb,
            }))
    }

    /// Allocates a program-unique statement id during phase 0.
    pub fn alloc_stmt_id(&mut self) -> Result<StmtId, PersistError> {
        Ok(self.prog_mut()?.alloc_stmt_id())
    }
}
