//! String-literal concatenation folding.
//!
//! A call to a `"string.concat"`-tagged function whose operands are both
//! literal constructions through `"string.makeUTF8"` / `"string.makeUTF16"`
//! collapses to a single literal construction of the concatenated contents.
//! Mixed encodings promote the UTF-8 side to UTF-16 and keep the UTF-16
//! maker.

use crate::ir::instr::{InstId, Instr, OperandList};
use crate::ir::types::{EffectsKind, StringEncoding};
use crate::ir::value::ValueId;
use crate::pattern;

use super::Combiner;

/// One side of the concatenation: a literal fed through its maker call.
struct MakeCall {
    /// The maker function-ref value, reusable for the folded call.
    maker: ValueId,
    value: String,
    encoding: StringEncoding,
    /// Length as reported to the maker, in code units of `encoding`.
    reported_len: i128,
    /// The length operand, kept for its literal type.
    len_operand: ValueId,
    /// The `isAscii` operand; present only for the UTF-8 maker.
    ascii_operand: Option<ValueId>,
    /// The trailing result-type operand of the maker call.
    result_type_operand: ValueId,
    transparent: bool,
}

fn code_unit_count(value: &str, encoding: StringEncoding) -> i128 {
    match encoding {
        StringEncoding::Utf8 => value.len() as i128,
        StringEncoding::Utf16 => value.encode_utf16().count() as i128,
    }
}

impl Combiner<'_> {
    pub(super) fn fold_string_concat(&mut self, id: InstId) -> Option<InstId> {
        let (callee, args) = match &self.func.inst(id).instr {
            Instr::Apply { callee, args, .. } => (*callee, args.clone()),
            _ => unreachable!(),
        };
        if args.len() != 2 {
            return None;
        }
        let concat_name = pattern::function_ref(self.func, callee)?;
        let decl = self.decls.get(concat_name)?;
        if decl.semantics.as_deref() != Some("string.concat")
            || decl.effects >= EffectsKind::ReadWrite
        {
            return None;
        }

        let left = self.extract_make_call(args[0])?;
        let right = self.extract_make_call(args[1])?;

        // Pick the surviving maker. On an encoding mismatch the UTF-8 side
        // is promoted, so the UTF-16 side's maker and result-type operand
        // win.
        use StringEncoding::{Utf16, Utf8};
        let (encoding, maker, transparent, result_type_operand) =
            match (left.encoding, right.encoding) {
                (l, r) if l == r => (l, left.maker, left.transparent, left.result_type_operand),
                (Utf8, Utf16) => (Utf16, right.maker, right.transparent, right.result_type_operand),
                (Utf16, Utf8) => (Utf16, left.maker, left.transparent, left.result_type_operand),
                _ => unreachable!(),
            };

        // The length a maker was handed must be the literal's actual
        // code-unit count; anything else is front-end breakage.
        assert_eq!(
            code_unit_count(&left.value, encoding),
            left.reported_len,
            "string.make length does not match literal code-unit count"
        );
        assert_eq!(
            code_unit_count(&right.value, encoding),
            right.reported_len,
            "string.make length does not match literal code-unit count"
        );

        // isAscii survives only in UTF-8, and only when both sides are
        // literally flagged ascii.
        let ascii = if encoding == Utf8 {
            let la = pattern::int_literal(self.func, left.ascii_operand?)?;
            let ra = pattern::int_literal(self.func, right.ascii_operand?)?;
            let ty = self.value_ty(left.ascii_operand?);
            Some(((la == 1 && ra == 1) as i128, ty))
        } else {
            None
        };

        let mut value = left.value;
        value.push_str(&right.value);
        let new_len = left.reported_len + right.reported_len;
        let len_ty = self.value_ty(left.len_operand);
        let result_ty = self.result_ty(id);

        let mut b = self.builder_before(id);
        let (_, lit) = b.create_string_literal(value, encoding);
        let (_, len) = b.create_integer_literal(new_len, len_ty);
        let mut new_args = OperandList::new();
        new_args.push(lit);
        new_args.push(len);
        if let Some((flag, ty)) = ascii {
            let (_, a) = b.create_integer_literal(flag, ty);
            new_args.push(a);
        }
        new_args.push(result_type_operand);
        let (new, _) = b.create_apply(maker, new_args, Vec::new(), transparent, result_ty);
        Some(new)
    }

    /// Recognizes `apply %make(%literal, %len, [%isAscii,] %type)` where
    /// `%make` is tagged `"string.makeUTF8"` (4 arguments) or
    /// `"string.makeUTF16"` (3 arguments) with effects below `ReadWrite`.
    fn extract_make_call(&self, v: ValueId) -> Option<MakeCall> {
        let (_, instr) = pattern::inst_def(self.func, v)?;
        let (callee, args, transparent) = match instr {
            Instr::Apply { callee, args, transparent, .. } => {
                (*callee, args.clone(), *transparent)
            }
            _ => return None,
        };
        let name = pattern::function_ref(self.func, callee)?;
        let decl = self.decls.get(name)?;
        if decl.effects >= EffectsKind::ReadWrite {
            return None;
        }
        let utf16 = match (decl.semantics.as_deref()?, args.len()) {
            ("string.makeUTF8", 4) => false,
            ("string.makeUTF16", 3) => true,
            _ => return None,
        };

        let (value, encoding) = pattern::string_literal(self.func, args[0])?;
        let reported_len = pattern::int_literal(self.func, args[1])?;
        Some(MakeCall {
            maker: callee,
            value: value.to_owned(),
            encoding,
            reported_len,
            len_operand: args[1],
            ascii_operand: (!utf16).then(|| args[2]),
            result_type_operand: if utf16 { args[2] } else { args[3] },
            transparent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_unit_counts_differ_by_encoding() {
        assert_eq!(code_unit_count("foo", StringEncoding::Utf8), 3);
        assert_eq!(code_unit_count("foo", StringEncoding::Utf16), 3);
        // Two bytes in UTF-8, one code unit in UTF-16.
        assert_eq!(code_unit_count("é", StringEncoding::Utf8), 2);
        assert_eq!(code_unit_count("é", StringEncoding::Utf16), 1);
    }
}
