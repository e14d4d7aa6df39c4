//! Expression parser and evaluator.
//!
//! Precedence climbing with one function per level, evaluating as it
//! parses. Several tokens serve two operators disambiguated by the kind of
//! the already-evaluated left operand (`%` is arithmetic after an integer,
//! formatting after a string; `&`, `|`, `*`, `-` similarly), so each level's
//! loop claims a token only when the left kind matches its class and
//! otherwise leaves it for an outer level.
//!
//! Short-circuiting operators clear `Interp::evaluating` around the skipped
//! subexpression; the recursion still consumes its tokens, but every
//! value-producing site (variable reads, calls, array construction,
//! assignment writes) no-ops while the flag is clear.

use core_status::{EdError, Result};
use core_value::fit::{check, OpClass};
use core_value::{ArrayRef, Datum};

use crate::lexer::{Lexer, Op, StrSeg, Tok};
use crate::{Host, Interp};

/// A parsed-and-evaluated node: the value plus, when the expression names a
/// storage location, the location itself.
#[derive(Debug, Clone)]
struct Node {
    val: Datum,
    lv: Option<LValue>,
    /// Set when the node is an identifier eligible for creation by
    /// assignment but not yet defined; dereferencing it is an error.
    undef: Option<String>,
}

impl Node {
    fn of(val: Datum) -> Self {
        Node {
            val,
            lv: None,
            undef: None,
        }
    }

    fn value(&self) -> Result<&Datum> {
        match &self.undef {
            Some(name) => Err(EdError::failure(format!("Undefined variable '{name}'"))),
            None => Ok(&self.val),
        }
    }

    fn take(self) -> Result<Datum> {
        match self.undef {
            Some(name) => Err(EdError::failure(format!("Undefined variable '{name}'"))),
            None => Ok(self.val),
        }
    }
}

#[derive(Debug, Clone)]
enum LValue {
    Local(String),
    Global(String),
    NumArg(u32),
    Special(String),
    Elem(ArrayRef, usize),
}

pub struct Parser<'a, H: Host> {
    lex: Lexer<'a>,
    tok: Tok,
    interp: &'a mut Interp,
    host: &'a mut H,
}

/// Evaluate a complete expression statement (parallel assignment allowed).
pub fn eval_expr<H: Host>(interp: &mut Interp, host: &mut H, src: &str) -> Result<Datum> {
    let mut p = Parser::new(interp, host, src)?;
    let node = p.parse_stmt()?;
    p.expect_eol()?;
    node.take()
}

impl<'a, H: Host> Parser<'a, H> {
    pub fn new(interp: &'a mut Interp, host: &'a mut H, src: &'a str) -> Result<Self> {
        let mut lex = Lexer::new(src);
        let tok = lex.next_tok(true)?;
        Ok(Self {
            lex,
            tok,
            interp,
            host,
        })
    }

    fn advance(&mut self, operand: bool) -> Result<()> {
        self.tok = self.lex.next_tok(operand)?;
        Ok(())
    }

    fn expect_eol(&self) -> Result<()> {
        if self.tok == Tok::Eol {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> EdError {
        EdError::failure(format!("Syntax error at '{}'", self.tok.text()))
    }

    fn evaluating(&self) -> bool {
        self.interp.evaluating
    }

    /// Run `f` with evaluation suppressed, restoring the previous state.
    fn skipped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.interp.evaluating;
        self.interp.evaluating = false;
        let out = f(self);
        self.interp.evaluating = saved;
        out
    }

    // ---- statement entry -------------------------------------------------

    /// Expression statement, including parallel assignment
    /// (`a, b, c = expr`).
    fn parse_stmt(&mut self) -> Result<Node> {
        let first = self.parse_expr()?;
        if self.tok != Tok::Comma {
            return Ok(first);
        }
        // Parallel assignment: collect the remaining lvalues.
        let mut targets: Vec<LValue> = Vec::new();
        match &first.lv {
            Some(lv) => targets.push(lv.clone()),
            None => return Err(EdError::failure("Not an lvalue in parallel assignment")),
        }
        while self.tok == Tok::Comma {
            self.advance(true)?;
            let node = self.parse_ternary()?;
            match node.lv {
                Some(lv) => targets.push(lv),
                None => return Err(EdError::failure("Not an lvalue in parallel assignment")),
            }
        }
        if self.tok != Tok::Op(Op::Assign) {
            return Err(self.unexpected());
        }
        self.advance(true)?;
        let rhs = self.parse_expr()?;
        if !self.evaluating() {
            return Ok(Node::of(Datum::Nil));
        }
        let value = rhs.take()?;
        let array = value.as_array().map_err(|_| {
            EdError::failure("Parallel assignment requires an array value")
        })?;
        let elems = array.to_vec();
        for (i, target) in targets.iter().enumerate() {
            let elem = elems.get(i).cloned().unwrap_or(Datum::Nil);
            self.assign(target, elem)?;
        }
        Ok(Node::of(value))
    }

    /// Full expression: lowest precedence is `and` / `or`.
    fn parse_expr(&mut self) -> Result<Node> {
        let mut left = self.parse_low_not()?;
        loop {
            let or = match &self.tok {
                Tok::Ident(w) if w == "and" => false,
                Tok::Ident(w) if w == "or" => true,
                _ => break,
            };
            self.advance(true)?;
            left = self.short_circuit(left, or, Self::parse_low_not)?;
        }
        Ok(left)
    }

    fn parse_low_not(&mut self) -> Result<Node> {
        if matches!(&self.tok, Tok::Ident(w) if w == "not") {
            self.advance(true)?;
            let operand = self.parse_low_not()?;
            if !self.evaluating() {
                return Ok(Node::of(Datum::Nil));
            }
            let truth = operand.value()?.is_true();
            return Ok(Node::of(Datum::Bool(!truth)));
        }
        self.parse_assign()
    }

    // ---- assignment ------------------------------------------------------

    fn parse_assign(&mut self) -> Result<Node> {
        let left = self.parse_ternary()?;
        let op = match &self.tok {
            Tok::Op(op @ (Op::Assign
            | Op::AssignAdd
            | Op::AssignSub
            | Op::AssignMul
            | Op::AssignDiv
            | Op::AssignMod
            | Op::AssignShl
            | Op::AssignShr
            | Op::AssignBitAnd
            | Op::AssignBitOr
            | Op::AssignBitXor)) => *op,
            _ => return Ok(left),
        };
        let lv = left
            .lv
            .clone()
            .ok_or_else(|| EdError::failure(format!("Not an lvalue before '{}'", op.text())))?;
        self.advance(true)?;
        // Right-associative.
        let rhs = self.parse_assign()?;
        if !self.evaluating() {
            return Ok(Node::of(Datum::Nil));
        }
        let value = if op == Op::Assign {
            rhs.take()?
        } else {
            let base = match op {
                Op::AssignAdd => Op::Plus,
                Op::AssignSub => Op::Minus,
                Op::AssignMul => Op::Star,
                Op::AssignDiv => Op::Slash,
                Op::AssignMod => Op::Percent,
                Op::AssignShl => Op::Shl,
                Op::AssignShr => Op::Shr,
                Op::AssignBitAnd => Op::Amp,
                Op::AssignBitOr => Op::Pipe,
                Op::AssignBitXor => Op::Caret,
                _ => unreachable!(),
            };
            let cur = left.value()?.clone();
            self.binop(base, &cur, rhs.value()?)?
        };
        self.assign(&lv, value.clone())?;
        Ok(Node {
            val: value,
            lv: Some(lv),
            undef: None,
        })
    }

    fn assign(&mut self, lv: &LValue, value: Datum) -> Result<()> {
        if !self.evaluating() {
            return Ok(());
        }
        match lv {
            LValue::Local(name) => {
                self.interp.frame_mut().locals.insert(name.clone(), value);
            }
            LValue::Global(name) => {
                self.interp.globals.insert(name.clone(), value);
            }
            LValue::NumArg(n) => {
                let args = &mut self.interp.frame_mut().args;
                let idx = (*n as usize)
                    .checked_sub(1)
                    .ok_or_else(|| EdError::failure("Cannot assign to $0"))?;
                if idx >= args.len() {
                    return Err(EdError::failure(format!("No argument ${n}")));
                }
                args[idx] = value;
            }
            LValue::Special(name) => {
                if !self.host.set_special(self.interp, name, &value)? {
                    self.interp.globals.insert(name.clone(), value);
                }
            }
            LValue::Elem(array, index) => {
                array.set(*index, value);
            }
        }
        Ok(())
    }

    // ---- conditional and logical ----------------------------------------

    fn parse_ternary(&mut self) -> Result<Node> {
        let cond = self.parse_oror()?;
        if self.tok != Tok::Op(Op::Question) {
            return Ok(cond);
        }
        self.advance(true)?;
        let truth = if self.evaluating() {
            cond.value()?.is_true()
        } else {
            false
        };
        let taken;
        if self.evaluating() && truth {
            taken = self.parse_ternary()?;
            if self.tok != Tok::Op(Op::Colon) {
                return Err(self.unexpected());
            }
            self.advance(true)?;
            self.skipped(|p| p.parse_ternary())?;
        } else if self.evaluating() {
            self.skipped(|p| p.parse_ternary())?;
            if self.tok != Tok::Op(Op::Colon) {
                return Err(self.unexpected());
            }
            self.advance(true)?;
            taken = self.parse_ternary()?;
        } else {
            self.parse_ternary()?;
            if self.tok != Tok::Op(Op::Colon) {
                return Err(self.unexpected());
            }
            self.advance(true)?;
            self.parse_ternary()?;
            taken = Node::of(Datum::Nil);
        }
        Ok(Node::of(taken.take()?))
    }

    fn parse_oror(&mut self) -> Result<Node> {
        let mut left = self.parse_andand()?;
        while self.tok == Tok::Op(Op::OrOr) {
            self.advance(true)?;
            left = self.short_circuit(left, true, Self::parse_andand)?;
        }
        Ok(left)
    }

    fn parse_andand(&mut self) -> Result<Node> {
        let mut left = self.parse_eq()?;
        while self.tok == Tok::Op(Op::AndAnd) {
            self.advance(true)?;
            left = self.short_circuit(left, false, Self::parse_eq)?;
        }
        Ok(left)
    }

    /// Shared logic for `&&` / `and` (or == false) and `||` / `or`
    /// (or == true): the right side is parsed but not evaluated when the
    /// left side decides the result.
    fn short_circuit(
        &mut self,
        left: Node,
        or: bool,
        rhs: impl FnOnce(&mut Self) -> Result<Node>,
    ) -> Result<Node> {
        if !self.evaluating() {
            rhs(self)?;
            return Ok(Node::of(Datum::Nil));
        }
        let lt = left.value()?.is_true();
        if lt == or {
            // Result decided; skip the right subexpression.
            self.skipped(rhs)?;
            Ok(Node::of(Datum::Bool(or)))
        } else {
            let right = rhs(self)?;
            Ok(Node::of(Datum::Bool(right.value()?.is_true())))
        }
    }

    // ---- binary ladders --------------------------------------------------

    fn parse_eq(&mut self) -> Result<Node> {
        let mut left = self.parse_rel()?;
        loop {
            let op = match &self.tok {
                Tok::Op(op @ (Op::EqEq | Op::Ne | Op::Match | Op::NotMatch)) => *op,
                _ => break,
            };
            self.advance(true)?;
            let right = self.parse_rel()?;
            left = self.apply(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_rel(&mut self) -> Result<Node> {
        let mut left = self.parse_concat()?;
        loop {
            let op = match &self.tok {
                Tok::Op(op @ (Op::Lt | Op::Le | Op::Gt | Op::Ge)) => *op,
                _ => break,
            };
            self.advance(true)?;
            let right = self.parse_concat()?;
            left = self.apply(op, left, right)?;
        }
        Ok(left)
    }

    /// `&` concatenation when the left operand is a string or array.
    fn parse_concat(&mut self) -> Result<Node> {
        let mut left = self.parse_union()?;
        while self.tok == Tok::Op(Op::Amp) {
            if self.evaluating()
                && !matches!(left.value()?, Datum::Str(_) | Datum::Array(_))
            {
                break;
            }
            self.advance(true)?;
            let right = self.parse_union()?;
            left = self.apply(Op::Amp, left, right)?;
        }
        Ok(left)
    }

    /// `|` union when the left operand is an array.
    fn parse_union(&mut self) -> Result<Node> {
        let mut left = self.parse_isect()?;
        while self.tok == Tok::Op(Op::Pipe) {
            if self.evaluating() && !matches!(left.value()?, Datum::Array(_)) {
                break;
            }
            self.advance(true)?;
            let right = self.parse_isect()?;
            left = self.apply(Op::Pipe, left, right)?;
        }
        Ok(left)
    }

    /// `*` intersection and `-` exclusion when the left operand is an array.
    fn parse_isect(&mut self) -> Result<Node> {
        let mut left = self.parse_format()?;
        loop {
            let op = match &self.tok {
                Tok::Op(op @ (Op::Star | Op::Minus)) => *op,
                _ => break,
            };
            if self.evaluating() && !matches!(left.value()?, Datum::Array(_)) {
                break;
            }
            self.advance(true)?;
            let right = self.parse_format()?;
            left = self.apply(op, left, right)?;
        }
        Ok(left)
    }

    /// `%` formatting when the left operand is a string.
    fn parse_format(&mut self) -> Result<Node> {
        let mut left = self.parse_bitor()?;
        while self.tok == Tok::Op(Op::Percent) {
            if self.evaluating() && !matches!(left.value()?, Datum::Str(_)) {
                break;
            }
            self.advance(true)?;
            let right = self.parse_bitor()?;
            left = self.apply(Op::Percent, left, right)?;
        }
        Ok(left)
    }

    /// `|` and `^` bitwise when the left operand is an integer.
    fn parse_bitor(&mut self) -> Result<Node> {
        let mut left = self.parse_bitand()?;
        loop {
            let op = match &self.tok {
                Tok::Op(op @ (Op::Pipe | Op::Caret)) => *op,
                _ => break,
            };
            if self.evaluating() && op == Op::Pipe && !matches!(left.value()?, Datum::Int(_)) {
                break;
            }
            self.advance(true)?;
            let right = self.parse_bitand()?;
            left = self.apply(op, left, right)?;
        }
        Ok(left)
    }

    /// `&` bitwise when the left operand is an integer.
    fn parse_bitand(&mut self) -> Result<Node> {
        let mut left = self.parse_shift()?;
        while self.tok == Tok::Op(Op::Amp) {
            if self.evaluating() && !matches!(left.value()?, Datum::Int(_)) {
                break;
            }
            self.advance(true)?;
            let right = self.parse_shift()?;
            left = self.apply(Op::Amp, left, right)?;
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Node> {
        let mut left = self.parse_numpfx()?;
        loop {
            let op = match &self.tok {
                Tok::Op(op @ (Op::Shl | Op::Shr)) => *op,
                _ => break,
            };
            self.advance(true)?;
            let right = self.parse_numpfx()?;
            left = self.apply(op, left, right)?;
        }
        Ok(left)
    }

    /// `n => func(...)`: apply a numeric prefix to the following call.
    fn parse_numpfx(&mut self) -> Result<Node> {
        let mut left = self.parse_add()?;
        while self.tok == Tok::Op(Op::NumPrefix) {
            self.advance(true)?;
            let name = match &self.tok {
                Tok::Ident(name) => name.clone(),
                _ => return Err(self.unexpected()),
            };
            self.advance(false)?;
            let n = if self.evaluating() {
                Some(left.value()?.as_int()?)
            } else {
                None
            };
            left = self.parse_call(&name, n)?;
        }
        Ok(left)
    }

    fn parse_add(&mut self) -> Result<Node> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match &self.tok {
                Tok::Op(op @ (Op::Plus | Op::Minus)) => *op,
                _ => break,
            };
            // `-` is set exclusion when the left side is an array.
            if self.evaluating() && op == Op::Minus && matches!(left.value()?, Datum::Array(_)) {
                break;
            }
            self.advance(true)?;
            let right = self.parse_mul()?;
            left = self.apply(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_mul(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match &self.tok {
                Tok::Op(op @ (Op::Star | Op::Slash | Op::Percent)) => *op,
                _ => break,
            };
            // These spellings belong to outer levels after a non-integer.
            if self.evaluating() && !matches!(left.value()?, Datum::Int(_)) {
                break;
            }
            self.advance(true)?;
            let right = self.parse_unary()?;
            left = self.apply(op, left, right)?;
        }
        Ok(left)
    }

    // ---- unary and postfix ----------------------------------------------

    fn parse_unary(&mut self) -> Result<Node> {
        match &self.tok {
            Tok::Op(Op::Minus) => {
                self.advance(true)?;
                let operand = self.parse_unary()?;
                if !self.evaluating() {
                    return Ok(Node::of(Datum::Nil));
                }
                let n = operand.value()?.as_int()?;
                Ok(Node::of(Datum::Int(n.wrapping_neg())))
            }
            Tok::Op(Op::Plus) => {
                self.advance(true)?;
                let operand = self.parse_unary()?;
                if !self.evaluating() {
                    return Ok(Node::of(Datum::Nil));
                }
                let n = operand.value()?.as_int()?;
                Ok(Node::of(Datum::Int(n)))
            }
            Tok::Op(Op::Not) => {
                self.advance(true)?;
                let operand = self.parse_unary()?;
                if !self.evaluating() {
                    return Ok(Node::of(Datum::Nil));
                }
                Ok(Node::of(Datum::Bool(!operand.value()?.is_true())))
            }
            Tok::Op(Op::BitNot) => {
                self.advance(true)?;
                let operand = self.parse_unary()?;
                if !self.evaluating() {
                    return Ok(Node::of(Datum::Nil));
                }
                Ok(Node::of(Datum::Int(!operand.value()?.as_int()?)))
            }
            Tok::Op(op @ (Op::PlusPlus | Op::MinusMinus)) => {
                let delta = if *op == Op::PlusPlus { 1 } else { -1 };
                self.advance(true)?;
                let operand = self.parse_postfix()?;
                self.incdec(operand, delta, true)
            }
            _ => self.parse_postfix(),
        }
    }

    fn incdec(&mut self, node: Node, delta: i64, prefix: bool) -> Result<Node> {
        if !self.evaluating() {
            return Ok(Node::of(Datum::Nil));
        }
        let lv = node
            .lv
            .clone()
            .ok_or_else(|| EdError::failure("Not an lvalue for '++'/'--'"))?;
        let old = node.value()?.as_int()?;
        let new = old.wrapping_add(delta);
        self.assign(&lv, Datum::Int(new))?;
        Ok(Node::of(Datum::Int(if prefix { new } else { old })))
    }

    fn parse_postfix(&mut self) -> Result<Node> {
        let mut node = self.parse_primary()?;
        loop {
            match &self.tok {
                Tok::Op(op @ (Op::PlusPlus | Op::MinusMinus)) => {
                    let delta = if *op == Op::PlusPlus { 1 } else { -1 };
                    self.advance(false)?;
                    node = self.incdec(node, delta, false)?;
                }
                Tok::LBracket => {
                    self.advance(true)?;
                    node = self.parse_subscript(node)?;
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// `a[i]` element access (negative indexes from the end) or `a[i, n]`
    /// slice of `n` elements.
    fn parse_subscript(&mut self, base: Node) -> Result<Node> {
        let index = self.parse_expr()?;
        let slice_len = if self.tok == Tok::Comma {
            self.advance(true)?;
            Some(self.parse_expr()?)
        } else {
            None
        };
        if self.tok != Tok::RBracket {
            return Err(self.unexpected());
        }
        self.advance(false)?;
        if !self.evaluating() {
            return Ok(Node::of(Datum::Nil));
        }
        let array = base.value()?.as_array()?.clone();
        let len = array.len() as i64;
        let raw = index.value()?.as_int()?;
        let at = if raw < 0 { len + raw } else { raw };
        if at < 0 {
            return Err(EdError::failure(format!("Array index {raw} out of range")));
        }
        match slice_len {
            None => {
                if at >= len {
                    return Err(EdError::failure(format!("Array index {raw} out of range")));
                }
                let val = array.get(at as usize).unwrap_or(Datum::Nil);
                Ok(Node {
                    val,
                    lv: Some(LValue::Elem(array, at as usize)),
                    undef: None,
                })
            }
            Some(n) => {
                let count = n.value()?.as_int()?.max(0) as usize;
                let elems = array.to_vec();
                let start = (at as usize).min(elems.len());
                let end = (start + count).min(elems.len());
                let slice = self.interp.pool.alloc(elems[start..end].to_vec());
                Ok(Node::of(Datum::Array(slice)))
            }
        }
    }

    // ---- primaries -------------------------------------------------------

    fn parse_primary(&mut self) -> Result<Node> {
        match self.tok.clone() {
            Tok::Int(n) => {
                self.advance(false)?;
                Ok(Node::of(Datum::Int(n)))
            }
            Tok::Str(segs) => {
                self.advance(false)?;
                let bytes = self.eval_string(&segs)?;
                if self.evaluating() {
                    Ok(Node::of(Datum::Str(bytes)))
                } else {
                    Ok(Node::of(Datum::Nil))
                }
            }
            Tok::LParen { .. } => {
                self.advance(true)?;
                let node = self.parse_stmt()?;
                if self.tok != Tok::RParen {
                    return Err(self.unexpected());
                }
                self.advance(false)?;
                Ok(node)
            }
            Tok::LBracket => {
                self.advance(true)?;
                self.parse_array_literal()
            }
            Tok::Var(name) => {
                self.advance(false)?;
                self.read_sigil_var(&name)
            }
            Tok::NumVar(n) => {
                self.advance(false)?;
                if !self.evaluating() {
                    return Ok(Node::of(Datum::Nil));
                }
                let val = if n == 0 {
                    Datum::Int(self.interp.frame().args.len() as i64)
                } else {
                    self.interp
                        .frame()
                        .args
                        .get((n - 1) as usize)
                        .cloned()
                        .unwrap_or(Datum::Nil)
                };
                Ok(Node {
                    val,
                    lv: Some(LValue::NumArg(n)),
                    undef: None,
                })
            }
            Tok::Ident(name) => match name.as_str() {
                "nil" => {
                    self.advance(false)?;
                    Ok(Node::of(Datum::Nil))
                }
                "true" => {
                    self.advance(false)?;
                    Ok(Node::of(Datum::Bool(true)))
                }
                "false" => {
                    self.advance(false)?;
                    Ok(Node::of(Datum::Bool(false)))
                }
                _ => {
                    // Resolve before advancing: after a callee the next
                    // token sits at operand position (so `?x` character
                    // literals work as arguments); after a variable it is
                    // an operator position (so `a ? b : c` stays a
                    // conditional).
                    let is_local = self.interp.frame().locals.contains_key(&name);
                    let is_callee = !is_local && self.host.lookup(&name).is_some();
                    self.advance(is_callee)?;
                    self.ident_primary(&name)
                }
            },
            Tok::Eol => Err(EdError::failure("Unexpected end of line")),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Node> {
        let mut elems = Vec::new();
        if self.tok != Tok::RBracket {
            loop {
                let node = self.parse_expr()?;
                if self.evaluating() {
                    elems.push(node.take()?);
                }
                if self.tok == Tok::Comma {
                    self.advance(true)?;
                } else {
                    break;
                }
            }
        }
        if self.tok != Tok::RBracket {
            return Err(self.unexpected());
        }
        self.advance(false)?;
        if !self.evaluating() {
            return Ok(Node::of(Datum::Nil));
        }
        let array = self.interp.pool.alloc(elems);
        Ok(Node::of(Datum::Array(array)))
    }

    /// Bare identifier: a local variable, else a callable, else a name
    /// creatable by assignment.
    fn ident_primary(&mut self, name: &str) -> Result<Node> {
        if let Some(val) = self.interp.frame().locals.get(name) {
            return Ok(Node {
                val: val.clone(),
                lv: Some(LValue::Local(name.to_string())),
                undef: None,
            });
        }
        if self.host.lookup(name).is_some() {
            return self.parse_call(name, None);
        }
        // Creatable by assignment; dereferencing it reports the name. In a
        // skipped subexpression the undef tag is withheld so the dead branch
        // cannot error.
        Ok(Node {
            val: Datum::Nil,
            lv: Some(LValue::Local(name.to_string())),
            undef: if self.evaluating() {
                Some(name.to_string())
            } else {
                None
            },
        })
    }

    /// `$name`: a system variable when the host claims it, else a global.
    fn read_sigil_var(&mut self, name: &str) -> Result<Node> {
        if !self.evaluating() {
            return Ok(Node {
                val: Datum::Nil,
                lv: Some(LValue::Global(name.to_string())),
                undef: None,
            });
        }
        if let Some(val) = self.host.get_special(self.interp, name)? {
            return Ok(Node {
                val,
                lv: Some(LValue::Special(name.to_string())),
                undef: None,
            });
        }
        match self.interp.globals.get(name) {
            Some(val) => Ok(Node {
                val: val.clone(),
                lv: Some(LValue::Global(name.to_string())),
                undef: None,
            }),
            None => Ok(Node {
                val: Datum::Nil,
                lv: Some(LValue::Global(name.to_string())),
                undef: Some(format!("${name}")),
            }),
        }
    }

    /// Parse and perform a call to `name`. The lookahead decides the
    /// argument form: a tight `(` opens a parenthesized list, an operand
    /// token begins space-separated comma-list arguments, anything else is
    /// a zero-argument call.
    fn parse_call(&mut self, name: &str, n: Option<i64>) -> Result<Node> {
        let info = self
            .host
            .lookup(name)
            .ok_or_else(|| EdError::failure(format!("Unknown command or function '{name}'")))?;
        let mut args: Vec<Datum> = Vec::new();
        let mut argc = 0usize;
        match &self.tok {
            Tok::LParen { tight: true } => {
                self.advance(true)?;
                if self.tok != Tok::RParen {
                    loop {
                        let node = self.parse_expr()?;
                        argc += 1;
                        if self.evaluating() {
                            args.push(node.take()?);
                        }
                        if self.tok == Tok::Comma {
                            self.advance(true)?;
                        } else {
                            break;
                        }
                    }
                }
                if self.tok != Tok::RParen {
                    return Err(self.unexpected());
                }
                self.advance(false)?;
            }
            tok if tok.starts_operand() => loop {
                let node = self.parse_expr()?;
                argc += 1;
                if self.evaluating() {
                    args.push(node.take()?);
                }
                if self.tok == Tok::Comma {
                    self.advance(true)?;
                } else {
                    break;
                }
            },
            _ => {}
        }
        if !info.accepts(argc) {
            return Err(EdError::failure(format!(
                "Wrong number of arguments for '{name}'"
            )));
        }
        if !self.evaluating() {
            return Ok(Node::of(Datum::Nil));
        }
        let val = self.host.call(self.interp, name, n, args)?;
        Ok(Node::of(val))
    }

    /// Assemble a double-quoted string, evaluating `#{...}` interpolations
    /// in a nested parse.
    fn eval_string(&mut self, segs: &[StrSeg]) -> Result<Vec<u8>> {
        if !self.evaluating() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for seg in segs {
            match seg {
                StrSeg::Lit(bytes) => out.extend_from_slice(bytes),
                StrSeg::Interp(src) => {
                    let val = eval_expr(self.interp, self.host, src)?;
                    out.extend_from_slice(&val.to_bytes());
                }
            }
        }
        Ok(out)
    }

    // ---- operator application -------------------------------------------

    fn apply(&mut self, op: Op, left: Node, right: Node) -> Result<Node> {
        if !self.evaluating() {
            return Ok(Node::of(Datum::Nil));
        }
        let val = self.binop(op, left.value()?, right.value()?)?;
        Ok(Node::of(val))
    }

    fn binop(&mut self, op: Op, left: &Datum, right: &Datum) -> Result<Datum> {
        let class = match op {
            Op::Minus if matches!(left, Datum::Array(_)) => OpClass::SET_ISECT,
            Op::Star if matches!(left, Datum::Array(_)) => OpClass::SET_ISECT,
            Op::Plus | Op::Minus | Op::Star | Op::Slash => OpClass::MATH,
            Op::Percent if matches!(left, Datum::Str(_)) => OpClass::FORMAT,
            Op::Percent => OpClass::MATH,
            Op::Shl | Op::Shr => OpClass::SHIFT,
            Op::Amp if matches!(left, Datum::Int(_)) => OpClass::BITWISE,
            Op::Amp => OpClass::CONCAT,
            Op::Pipe if matches!(left, Datum::Int(_)) => OpClass::BITWISE,
            Op::Pipe => OpClass::SET_UNION,
            Op::Caret => OpClass::BITWISE,
            Op::Lt | Op::Le | Op::Gt | Op::Ge => OpClass::REL,
            Op::EqEq | Op::Ne => OpClass::EQ,
            Op::Match | Op::NotMatch => OpClass::MATCH,
            _ => return Err(EdError::failure(format!("Unhandled operator '{}'", op.text()))),
        };
        let coerce = check(left.kind(), right.kind(), class).ok_or_else(|| {
            EdError::failure(format!(
                "Wrong operand type for '{}' ({} and {})",
                op.text(),
                left.kind().name(),
                right.kind().name()
            ))
        })?;

        match class {
            OpClass::MATH => {
                let a = left.as_int()?;
                let b = right.as_int()?;
                let val = match op {
                    Op::Plus => a.wrapping_add(b),
                    Op::Minus => a.wrapping_sub(b),
                    Op::Star => a.wrapping_mul(b),
                    Op::Slash => {
                        if b == 0 {
                            return Err(EdError::failure("Division by zero"));
                        }
                        a.wrapping_div(b)
                    }
                    Op::Percent => {
                        if b == 0 {
                            return Err(EdError::failure("Division by zero"));
                        }
                        a.wrapping_rem(b)
                    }
                    _ => unreachable!(),
                };
                Ok(Datum::Int(val))
            }
            OpClass::SHIFT => {
                let a = left.as_int()?;
                let b = right.as_int()? as u32 % 64;
                Ok(Datum::Int(match op {
                    Op::Shl => a.wrapping_shl(b),
                    Op::Shr => a.wrapping_shr(b),
                    _ => unreachable!(),
                }))
            }
            OpClass::BITWISE => {
                let a = left.as_int()?;
                let b = right.as_int()?;
                Ok(Datum::Int(match op {
                    Op::Amp => a & b,
                    Op::Pipe => a | b,
                    Op::Caret => a ^ b,
                    _ => unreachable!(),
                }))
            }
            OpClass::FORMAT => {
                let fmt = left.as_str()?;
                let args = match right {
                    Datum::Array(a) => a.to_vec(),
                    other => vec![other.clone()],
                };
                Ok(Datum::Str(format_bytes(fmt, &args)?))
            }
            OpClass::CONCAT => match left {
                Datum::Str(s) => {
                    let mut out = s.clone();
                    if coerce.contains(OpClass::STR_RIGHT) {
                        out.extend_from_slice(&right.to_bytes());
                    } else {
                        out.extend_from_slice(right.as_str()?);
                    }
                    Ok(Datum::Str(out))
                }
                Datum::Array(a) => {
                    let mut elems = a.to_vec();
                    match right {
                        Datum::Array(b) => elems.extend(b.to_vec()),
                        other => elems.push(other.clone()),
                    }
                    Ok(Datum::Array(self.interp.pool.alloc(elems)))
                }
                _ => unreachable!("fit table admits only str/array"),
            },
            OpClass::SET_ISECT => {
                let a = left.as_array()?.to_vec();
                let b = right.as_array()?.to_vec();
                let elems: Vec<Datum> = match op {
                    Op::Star => dedup(a.into_iter().filter(|x| b.contains(x)).collect()),
                    Op::Minus => dedup(a.into_iter().filter(|x| !b.contains(x)).collect()),
                    _ => unreachable!(),
                };
                Ok(Datum::Array(self.interp.pool.alloc(elems)))
            }
            OpClass::SET_UNION => {
                let mut elems = dedup(left.as_array()?.to_vec());
                for x in right.as_array()?.to_vec() {
                    if !elems.contains(&x) {
                        elems.push(x);
                    }
                }
                Ok(Datum::Array(self.interp.pool.alloc(elems)))
            }
            OpClass::REL => {
                let ord = match (left, right) {
                    (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
                    (Datum::Str(a), Datum::Str(b)) => a.cmp(b),
                    _ => unreachable!("fit table admits int/int and str/str"),
                };
                let val = match op {
                    Op::Lt => ord.is_lt(),
                    Op::Le => ord.is_le(),
                    Op::Gt => ord.is_gt(),
                    Op::Ge => ord.is_ge(),
                    _ => unreachable!(),
                };
                Ok(Datum::Bool(val))
            }
            OpClass::EQ => {
                let equal = left == right;
                Ok(Datum::Bool(if op == Op::EqEq { equal } else { !equal }))
            }
            OpClass::MATCH => {
                let matched = self.host.match_pattern(left.as_str()?, right.as_str()?)?;
                Ok(Datum::Bool(if op == Op::Match {
                    matched
                } else {
                    !matched
                }))
            }
            _ => unreachable!(),
        }
    }
}

fn dedup(elems: Vec<Datum>) -> Vec<Datum> {
    let mut out: Vec<Datum> = Vec::with_capacity(elems.len());
    for e in elems {
        if !out.contains(&e) {
            out.push(e);
        }
    }
    out
}

/// printf-style formatting over byte strings: `%d %u %x %X %o %c %s %%`
/// with optional `-`, `0`, and width.
pub fn format_bytes(fmt: &[u8], args: &[Datum]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(fmt.len());
    let mut next = 0usize;
    let mut i = 0usize;
    while i < fmt.len() {
        if fmt[i] != b'%' {
            out.push(fmt[i]);
            i += 1;
            continue;
        }
        i += 1;
        if i >= fmt.len() {
            return Err(EdError::failure("Truncated format specifier"));
        }
        if fmt[i] == b'%' {
            out.push(b'%');
            i += 1;
            continue;
        }
        let mut left = false;
        let mut zero = false;
        while i < fmt.len() {
            match fmt[i] {
                b'-' => left = true,
                b'0' => zero = true,
                _ => break,
            }
            i += 1;
        }
        let mut width = 0usize;
        while i < fmt.len() && fmt[i].is_ascii_digit() {
            width = width * 10 + (fmt[i] - b'0') as usize;
            i += 1;
        }
        if i >= fmt.len() {
            return Err(EdError::failure("Truncated format specifier"));
        }
        let arg = args
            .get(next)
            .ok_or_else(|| EdError::failure("Too few arguments for format string"))?;
        next += 1;
        let piece: Vec<u8> = match fmt[i] {
            b'd' => arg.as_int()?.to_string().into_bytes(),
            b'u' => (arg.as_int()? as u64).to_string().into_bytes(),
            b'x' => format!("{:x}", arg.as_int()?).into_bytes(),
            b'X' => format!("{:X}", arg.as_int()?).into_bytes(),
            b'o' => format!("{:o}", arg.as_int()?).into_bytes(),
            b'c' => vec![arg.as_int()? as u8],
            b's' => arg.to_bytes(),
            other => {
                return Err(EdError::failure(format!(
                    "Unknown format specifier '%{}'",
                    other as char
                )))
            }
        };
        i += 1;
        if piece.len() >= width {
            out.extend_from_slice(&piece);
        } else {
            let pad = width - piece.len();
            if left {
                out.extend_from_slice(&piece);
                out.extend(std::iter::repeat(b' ').take(pad));
            } else {
                let fill = if zero { b'0' } else { b' ' };
                out.extend(std::iter::repeat(fill).take(pad));
                out.extend_from_slice(&piece);
            }
        }
    }
    Ok(out)
}
