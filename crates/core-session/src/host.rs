//! The session as the interpreter's host: callee resolution, system
//! variables, pattern matching, and user-routine storage.

use core_script::{CalleeInfo, Host, Interp, RoutineDef, RoutineKind};
use core_status::{EdError, Result};
use core_text::{BufFlags, CallInfo, Point, RoutineKind as BufRoutineKind, MAX_BUFNAME, ROUTINE_PREFIX};
use core_value::Datum;

use crate::registry::ExecEntry;
use crate::search::Pattern;
use crate::Session;

impl Host for Session {
    fn lookup(&self, name: &str) -> Option<CalleeInfo> {
        match self.exec.resolve(name)? {
            ExecEntry::Builtin(def) => Some(CalleeInfo {
                min_args: def.min_args,
                max_args: def.max_args,
            }),
            ExecEntry::UserCmd { buf } | ExecEntry::UserFunc { buf } => {
                if !self.buffers.exists(buf) {
                    return None;
                }
                let ci = self.buffers.get(buf).call_info.as_ref();
                Some(CalleeInfo {
                    min_args: ci.map(|c| c.min_args).unwrap_or(0),
                    max_args: ci.map(|c| c.max_args).unwrap_or(-1),
                })
            }
            ExecEntry::Alias { .. } => None,
        }
    }

    fn call(
        &mut self,
        interp: &mut Interp,
        name: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Result<Datum> {
        self.call_by_name(interp, name, n, args)
    }

    fn get_special(&mut self, interp: &mut Interp, name: &str) -> Result<Option<Datum>> {
        let value = match name {
            "bufName" => Datum::str(self.cur_buf().name.clone()),
            "bufFile" => match &self.cur_buf().filename {
                Some(p) => Datum::str(p.to_string_lossy().into_owned()),
                None => Datum::Nil,
            },
            "lineNum" => {
                let pt = self.point();
                Datum::Int(self.cur_buf().line_num(pt.line) as i64)
            }
            "lineOffset" => Datum::Int(self.point().off as i64),
            "lineText" => {
                let pt = self.point();
                Datum::Str(self.cur_buf().line_text(pt.line).to_vec())
            }
            "wrapCol" => Datum::Int(self.screen().wrap_col as i64),
            "softTabSize" => Datum::Int(self.screen().soft_tab as i64),
            "hardTabSize" => Datum::Int(self.screen().hard_tab as i64),
            "maxLoop" => Datum::Int(interp.max_loop as i64),
            "searchPat" => Datum::Str(self.search_pat.clone()),
            "replacePat" => Datum::Str(self.replace_pat.clone()),
            "wordChars" => Datum::Str(self.char_class.word_bytes()),
            "windCount" => Datum::Int(self.screen().window_count() as i64),
            "screenCount" => Datum::Int(self.screens.len() as i64),
            "workDir" => Datum::str(self.screen().work_dir.to_string_lossy().into_owned()),
            "returnMsg" => Datum::Str(self.rtn_msg.clone()),
            "bufList" => {
                let names: Vec<Datum> = self
                    .buffers
                    .ids()
                    .into_iter()
                    .map(|id| Datum::str(self.buffers.get(id).name.clone()))
                    .collect();
                Datum::Array(interp.pool.alloc(names))
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn set_special(&mut self, interp: &mut Interp, name: &str, value: &Datum) -> Result<bool> {
        match name {
            "lineNum" => {
                let n = value.as_int()?;
                let buf = self.cur_buf();
                let line = buf
                    .line_at(n.max(1) as usize)
                    .unwrap_or_else(|| buf.last_line());
                self.set_point(Point::new(line, 0));
            }
            "lineOffset" => {
                let n = value.as_int()?.max(0) as usize;
                let mut pt = self.point();
                pt.off = n.min(self.cur_buf().line_used(pt.line));
                self.set_point(pt);
            }
            "wrapCol" => {
                let n = value.as_int()?;
                if n < 0 {
                    return Err(EdError::failure("Wrap column cannot be negative"));
                }
                self.screen_mut().wrap_col = n as usize;
            }
            "softTabSize" => {
                self.screen_mut().soft_tab = value.as_int()?.max(0) as usize;
            }
            "hardTabSize" => {
                let n = value.as_int()?;
                if n < 1 {
                    return Err(EdError::failure("Hard tab size must be positive"));
                }
                self.screen_mut().hard_tab = n as usize;
            }
            "maxLoop" => {
                interp.max_loop = value.as_int()?.max(0) as u32;
            }
            "searchPat" => {
                self.search_pat = value.as_str()?.to_vec();
                self.rings.search.push(value.clone());
            }
            "replacePat" => {
                self.replace_pat = value.as_str()?.to_vec();
                self.rings.replace.push(value.clone());
            }
            "wordChars" => {
                let extra: Vec<u8> = value
                    .as_str()?
                    .iter()
                    .copied()
                    .filter(|c| !c.is_ascii_alphanumeric())
                    .collect();
                self.char_class.extend(&extra);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn match_pattern(&mut self, subject: &[u8], pattern: &[u8]) -> Result<bool> {
        let regexp = self.global_modes.is_enabled("Regexp");
        let exact = self.global_modes.is_enabled("Exact");
        let pat = Pattern::compile(pattern, regexp, exact)?;
        Ok(pat.is_match(subject))
    }

    fn define_routine(&mut self, def: RoutineDef) -> Result<()> {
        let buf_name: String = format!("{ROUTINE_PREFIX}{}", def.name)
            .chars()
            .take(MAX_BUFNAME)
            .collect();
        let (buf_id, _) = self.buffers.obtain(&buf_name)?;
        let kind = match def.kind {
            RoutineKind::Command => BufRoutineKind::Command,
            RoutineKind::Function => BufRoutineKind::Function,
        };
        {
            let buf = self.buffers.get_mut(buf_id);
            buf.set_text(def.body.join("\n").as_bytes());
            buf.flags.insert(BufFlags::HIDDEN);
            buf.flags.insert(match kind {
                BufRoutineKind::Command => BufFlags::COMMAND,
                BufRoutineKind::Function => BufFlags::FUNCTION,
            });
            let mut ci = CallInfo::new(kind, def.min_args, def.max_args);
            ci.descrip = def.descrip.clone();
            buf.call_info = Some(ci);
        }
        let entry = match kind {
            BufRoutineKind::Command => ExecEntry::UserCmd { buf: buf_id },
            BufRoutineKind::Function => ExecEntry::UserFunc { buf: buf_id },
        };
        self.exec.insert_user(&def.name, entry)?;
        tracing::debug!(target: "session.exec", name = %def.name, "routine defined");
        Ok(())
    }
}
