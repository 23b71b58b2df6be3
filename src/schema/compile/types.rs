//! Type compilation: typedef chain resolution and restriction intersection.
//!
//! A parsed type reference resolves either to a built-in kind or to a
//! typedef found through the nested-first scope chain. Compilation recurses
//! down the chain to the built-in, then folds each level's restrictions over
//! the inherited compiled type. A level that adds nothing shares the
//! inherited `Rc`, which is how typedef chains end up with one compiled type
//! and a reference count.

use std::cell::RefCell;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::error::{Error, Result};
use crate::schema::compiled::{
    BitSpec, EnumSpec, LengthSpan, RangeSpan, SchemaPattern, SchemaType, TypeDetails, TypeKind,
};
use crate::schema::parsed::{ParsedRestriction, ParsedType, ParsedTypedef};
use crate::schema::pattern;
use crate::xpath::LeafrefPath;

use super::{CompileCtx, ScopeFrame};

impl<'w> CompileCtx<'w, '_> {
    /// Compile a parsed type reference.
    ///
    /// Returns the compiled type plus the units and default inherited from
    /// the typedef chain; the innermost occurrence of each wins, and the
    /// caller's own statements override both.
    pub fn compile_type<'a>(
        &mut self,
        ty: &'a ParsedType,
        scope: &'a ScopeFrame<'a>,
        context_name: &str,
    ) -> Result<(Rc<SchemaType>, Option<SmolStr>, Option<SmolStr>)>
    where
        'w: 'a,
    {
        let (result, units, default) = self.compile_type_inner(ty, scope, context_name)?;
        // A terminal use of the type must be complete.
        self.check_type_complete(&result, context_name)?;
        Ok((result, units, default))
    }

    fn compile_type_inner<'a>(
        &mut self,
        ty: &'a ParsedType,
        scope: &'a ScopeFrame<'a>,
        context_name: &str,
    ) -> Result<(Rc<SchemaType>, Option<SmolStr>, Option<SmolStr>)>
    where
        'w: 'a,
    {
        let (base, units, default) = match self.resolve_type_name(ty, scope)? {
            ResolvedType::Builtin(kind) => (Rc::new(SchemaType::plain(kind)), None, None),
            ResolvedType::Typedef(td, frame) => self.compile_typedef(td, frame)?,
        };

        let derived = self.apply_restrictions(&base, ty, scope, context_name)?;
        Ok(match derived {
            Some(t) => (Rc::new(t), units, default),
            None => (base, units, default),
        })
    }

    /// Compile a typedef once, memoized by its address. The memo also holds
    /// the units/default visible at that level of the chain.
    fn compile_typedef<'a>(
        &mut self,
        td: &'a ParsedTypedef,
        frame: ScopeFrame<'a>,
    ) -> Result<(Rc<SchemaType>, Option<SmolStr>, Option<SmolStr>)>
    where
        'w: 'a,
    {
        let key = td as *const ParsedTypedef as usize;
        if let Some((ty, units, default)) = self.type_memo.get(&key) {
            return Ok((Rc::clone(ty), units.clone(), default.clone()));
        }
        if self.typedef_stack.contains(&key) {
            return Err(Error::cycle("typedef", td.name.to_string()));
        }
        self.typedef_stack.push(key);
        let result = self.compile_type_inner(&td.ty, &frame, &td.name);
        self.typedef_stack.pop();
        let (base, inherited_units, inherited_default) = result?;

        let mut compiled = base;
        if compiled.typedef.is_none() {
            // First naming level wins for diagnostics.
            if let Some(t) = Rc::get_mut(&mut compiled) {
                t.typedef = Some(Rc::clone(&td.name));
            }
        }
        let units = td.units.clone().or(inherited_units);
        let default = td.default.clone().or(inherited_default);
        self.type_memo
            .insert(key, (Rc::clone(&compiled), units.clone(), default.clone()));
        Ok((compiled, units, default))
    }

    fn resolve_type_name<'a>(
        &self,
        ty: &'a ParsedType,
        scope: &'a ScopeFrame<'a>,
    ) -> Result<ResolvedType<'a>>
    where
        'w: 'a,
    {
        match &ty.prefix {
            None => {
                if let Some(kind) = TypeKind::from_name(&ty.name) {
                    return Ok(ResolvedType::Builtin(kind));
                }
                scope
                    .find_typedef(&ty.name)
                    .map(|(td, frame)| ResolvedType::Typedef(td, frame))
                    .ok_or_else(|| Error::not_found("typedef", ty.name.to_string()))
            }
            Some(prefix) => {
                let module = self.resolve_prefix(scope.module, Some(prefix))?;
                if module == scope.module {
                    // Own prefix: same as unprefixed.
                    if let Some(kind) = TypeKind::from_name(&ty.name) {
                        return Ok(ResolvedType::Builtin(kind));
                    }
                    return scope
                        .find_typedef(&ty.name)
                        .map(|(td, frame)| ResolvedType::Typedef(td, frame))
                        .ok_or_else(|| Error::not_found("typedef", ty.name.to_string()));
                }
                let foreign = ScopeFrame::module_root(self.world, module);
                let td = self.world[module]
                    .typedefs
                    .iter()
                    .find(|t| *t.name == *ty.name)
                    .ok_or_else(|| {
                        Error::not_found("typedef", format!("{prefix}:{}", ty.name))
                    })?;
                Ok(ResolvedType::Typedef(td, foreign))
            }
        }
    }

    /// Fold one level of restrictions over the inherited type. Returns
    /// `None` when the level adds nothing and the inherited `Rc` is shared.
    fn apply_restrictions<'a>(
        &mut self,
        base: &Rc<SchemaType>,
        ty: &'a ParsedType,
        scope: &'a ScopeFrame<'a>,
        context_name: &str,
    ) -> Result<Option<SchemaType>>
    where
        'w: 'a,
    {
        let restricted = ty.range.is_some()
            || ty.length.is_some()
            || !ty.patterns.is_empty()
            || !ty.enums.is_empty()
            || !ty.bits.is_empty()
            || ty.fraction_digits.is_some()
            || ty.path.is_some()
            || ty.require_instance.is_some()
            || !ty.bases.is_empty()
            || !ty.union_types.is_empty()
            || !ty.exts.is_empty();
        if !restricted {
            return Ok(None);
        }

        let kind = base.kind;
        let fail = |code, msg: String| Err(Error::validation(code, msg));

        // Reject restrictions foreign to the kind up front.
        if ty.range.is_some() && !kind.is_integer() && kind != TypeKind::Decimal64 {
            return fail(
                "invalid-restriction",
                format!("'range' does not apply to {} ({context_name})", kind.as_str()),
            );
        }
        if ty.length.is_some() && !matches!(kind, TypeKind::String | TypeKind::Binary) {
            return fail(
                "invalid-restriction",
                format!("'length' does not apply to {} ({context_name})", kind.as_str()),
            );
        }
        if !ty.patterns.is_empty() && kind != TypeKind::String {
            return fail(
                "invalid-restriction",
                format!("'pattern' does not apply to {} ({context_name})", kind.as_str()),
            );
        }
        if !ty.enums.is_empty() && kind != TypeKind::Enumeration {
            return fail(
                "invalid-restriction",
                format!("'enum' does not apply to {} ({context_name})", kind.as_str()),
            );
        }
        if !ty.bits.is_empty() && kind != TypeKind::Bits {
            return fail(
                "invalid-restriction",
                format!("'bit' does not apply to {} ({context_name})", kind.as_str()),
            );
        }
        if ty.fraction_digits.is_some() && kind != TypeKind::Decimal64 {
            return fail(
                "invalid-restriction",
                format!(
                    "'fraction-digits' does not apply to {} ({context_name})",
                    kind.as_str()
                ),
            );
        }
        if ty.path.is_some() && kind != TypeKind::Leafref {
            return fail(
                "invalid-restriction",
                format!("'path' does not apply to {} ({context_name})", kind.as_str()),
            );
        }
        if ty.require_instance.is_some()
            && !matches!(kind, TypeKind::Leafref | TypeKind::InstanceIdentifier)
        {
            return fail(
                "invalid-restriction",
                format!(
                    "'require-instance' does not apply to {} ({context_name})",
                    kind.as_str()
                ),
            );
        }
        if !ty.bases.is_empty() && kind != TypeKind::IdentityRef {
            return fail(
                "invalid-restriction",
                format!("'base' does not apply to {} ({context_name})", kind.as_str()),
            );
        }
        if !ty.union_types.is_empty() && kind != TypeKind::Union {
            return fail(
                "invalid-restriction",
                format!("'type' does not apply to {} ({context_name})", kind.as_str()),
            );
        }

        let details = match &base.details {
            TypeDetails::Integer { ranges } => {
                let ranges = match &ty.range {
                    Some(r) => intersect_spans(r, ranges, |s| parse_int_value(s), context_name)?,
                    None => ranges.clone(),
                };
                TypeDetails::Integer { ranges }
            }
            TypeDetails::Decimal {
                fraction_digits,
                ranges,
            } => {
                let mut fd = *fraction_digits;
                if let Some(new_fd) = ty.fraction_digits {
                    if fd != 0 {
                        return fail(
                            "fraction-digits-redefined",
                            format!(
                                "fraction-digits already set in the typedef chain of {context_name}"
                            ),
                        );
                    }
                    if new_fd == 0 || new_fd > 18 {
                        return fail(
                            "invalid-fraction-digits",
                            format!("fraction-digits {new_fd} out of 1..18 ({context_name})"),
                        );
                    }
                    fd = new_fd;
                }
                if fd == 0 {
                    return fail(
                        "missing-fraction-digits",
                        format!("decimal64 without fraction-digits ({context_name})"),
                    );
                }
                let inherited = if ranges.is_empty() {
                    vec![RangeSpan {
                        lo: i64::MIN as i128,
                        hi: i64::MAX as i128,
                    }]
                } else {
                    ranges.clone()
                };
                let ranges = match &ty.range {
                    Some(r) => {
                        intersect_spans(r, &inherited, |s| parse_decimal_value(s, fd), context_name)?
                    }
                    None => inherited,
                };
                TypeDetails::Decimal {
                    fraction_digits: fd,
                    ranges,
                }
            }
            TypeDetails::Str { lengths, patterns } => {
                let lengths = match &ty.length {
                    Some(l) => intersect_lengths(l, lengths, context_name)?,
                    None => lengths.clone(),
                };
                let patterns = self.compile_type_patterns(&ty.patterns, patterns, scope.module)?;
                TypeDetails::Str { lengths, patterns }
            }
            TypeDetails::Binary { lengths } => {
                let lengths = match &ty.length {
                    Some(l) => intersect_lengths(l, lengths, context_name)?,
                    None => lengths.clone(),
                };
                TypeDetails::Binary { lengths }
            }
            TypeDetails::Enumeration { enums } => {
                let enums = self.compile_enums(ty, enums, scope, context_name)?;
                TypeDetails::Enumeration { enums }
            }
            TypeDetails::Bits { bits } => {
                let bits = self.compile_bits(ty, bits, scope, context_name)?;
                TypeDetails::Bits { bits }
            }
            TypeDetails::Leafref {
                path,
                path_module,
                require_instance,
                ..
            } => {
                if ty.path.is_some() {
                    return fail(
                        "path-redefined",
                        format!("leafref path already set in the typedef chain of {context_name}"),
                    );
                }
                TypeDetails::Leafref {
                    path: path.clone(),
                    path_module: *path_module,
                    require_instance: ty.require_instance.unwrap_or(*require_instance),
                    realized: RefCell::new(None),
                }
            }
            TypeDetails::InstanceIdentifier { require_instance } => {
                TypeDetails::InstanceIdentifier {
                    require_instance: ty.require_instance.unwrap_or(*require_instance),
                }
            }
            TypeDetails::IdentityRef { bases, .. } => {
                let mut all = bases.clone();
                for base_ref in &ty.bases {
                    let module =
                        self.resolve_prefix(scope.module, base_ref.prefix.as_deref())?;
                    let id = self.find_identity(module, &base_ref.name).ok_or_else(|| {
                        Error::not_found("identity", base_ref.name.to_string())
                    })?;
                    if !all.contains(&id) {
                        all.push(id);
                    }
                }
                TypeDetails::IdentityRef {
                    bases: all,
                    permitted: RefCell::new(Vec::new()),
                }
            }
            TypeDetails::Union { members } => {
                if !members.is_empty() && !ty.union_types.is_empty() {
                    return fail(
                        "union-restricted",
                        format!("derived union may not add member types ({context_name})"),
                    );
                }
                let mut compiled = members.clone();
                for member in &ty.union_types {
                    let (m, _, _) = self.compile_type_inner(member, scope, context_name)?;
                    self.check_type_complete(&m, context_name)?;
                    compiled.push(m);
                }
                TypeDetails::Union { members: compiled }
            }
            TypeDetails::Plain => match kind {
                // First restriction level of these kinds builds the details.
                TypeKind::Leafref => {
                    let Some(path) = &ty.path else {
                        return fail(
                            "missing-path",
                            format!("leafref without path ({context_name})"),
                        );
                    };
                    TypeDetails::Leafref {
                        path: LeafrefPath::parse(path)?,
                        path_module: crate::schema::compiled::ModuleId(scope.module as u32),
                        require_instance: ty.require_instance.unwrap_or(true),
                        realized: RefCell::new(None),
                    }
                }
                TypeKind::Enumeration => {
                    let enums = self.compile_enums(ty, &[], scope, context_name)?;
                    TypeDetails::Enumeration { enums }
                }
                TypeKind::Bits => {
                    let bits = self.compile_bits(ty, &[], scope, context_name)?;
                    TypeDetails::Bits { bits }
                }
                TypeKind::IdentityRef => {
                    let mut all = Vec::new();
                    for base_ref in &ty.bases {
                        let module =
                            self.resolve_prefix(scope.module, base_ref.prefix.as_deref())?;
                        let id =
                            self.find_identity(module, &base_ref.name).ok_or_else(|| {
                                Error::not_found("identity", base_ref.name.to_string())
                            })?;
                        if !all.contains(&id) {
                            all.push(id);
                        }
                    }
                    TypeDetails::IdentityRef {
                        bases: all,
                        permitted: RefCell::new(Vec::new()),
                    }
                }
                TypeKind::Decimal64 => {
                    let Some(fd) = ty.fraction_digits else {
                        return fail(
                            "missing-fraction-digits",
                            format!("decimal64 without fraction-digits ({context_name})"),
                        );
                    };
                    if fd == 0 || fd > 18 {
                        return fail(
                            "invalid-fraction-digits",
                            format!("fraction-digits {fd} out of 1..18 ({context_name})"),
                        );
                    }
                    let inherited = vec![RangeSpan {
                        lo: i64::MIN as i128,
                        hi: i64::MAX as i128,
                    }];
                    let ranges = match &ty.range {
                        Some(r) => intersect_spans(
                            r,
                            &inherited,
                            |s| parse_decimal_value(s, fd),
                            context_name,
                        )?,
                        None => inherited,
                    };
                    TypeDetails::Decimal {
                        fraction_digits: fd,
                        ranges,
                    }
                }
                TypeKind::Union => {
                    if ty.union_types.is_empty() {
                        return fail(
                            "missing-union-types",
                            format!("union without member types ({context_name})"),
                        );
                    }
                    let mut compiled = Vec::new();
                    for member in &ty.union_types {
                        let (m, _, _) = self.compile_type_inner(member, scope, context_name)?;
                        self.check_type_complete(&m, context_name)?;
                        compiled.push(m);
                    }
                    TypeDetails::Union { members: compiled }
                }
                TypeKind::Boolean | TypeKind::Empty => TypeDetails::Plain,
                other => {
                    return Err(Error::Internal(format!(
                        "unexpected plain details for {}",
                        other.as_str()
                    )));
                }
            },
        };

        let exts = self.compile_exts(&ty.exts, scope.module)?;
        Ok(Some(SchemaType {
            kind,
            typedef: base.typedef.clone(),
            details,
            exts,
        }))
    }

    /// A terminal type must have everything its kind requires.
    fn check_type_complete(&self, ty: &SchemaType, context_name: &str) -> Result<()> {
        let missing = match (&ty.kind, &ty.details) {
            (TypeKind::Leafref, TypeDetails::Plain) => Some("path"),
            (TypeKind::Enumeration, TypeDetails::Plain) => Some("enum"),
            (TypeKind::Enumeration, TypeDetails::Enumeration { enums }) if enums.is_empty() => {
                Some("enum")
            }
            (TypeKind::Bits, TypeDetails::Plain) => Some("bit"),
            (TypeKind::IdentityRef, TypeDetails::Plain) => Some("base"),
            (TypeKind::IdentityRef, TypeDetails::IdentityRef { bases, .. })
                if bases.is_empty() =>
            {
                Some("base")
            }
            (TypeKind::Decimal64, TypeDetails::Plain) => Some("fraction-digits"),
            (TypeKind::Union, TypeDetails::Plain) => Some("type"),
            _ => None,
        };
        match missing {
            Some(stmt) => Err(Error::validation(
                "incomplete-type",
                format!(
                    "type {} of '{context_name}' is missing its '{stmt}' statement",
                    ty.kind.as_str()
                ),
            )),
            None => Ok(()),
        }
    }

    /// Merge parsed patterns onto the inherited compiled array. The result
    /// is `base ++ own`, each keeping its invert-match bit, so matching
    /// stays cumulative along the chain.
    pub fn compile_type_patterns(
        &mut self,
        parsed: &[crate::schema::parsed::ParsedPattern],
        base: &[Rc<SchemaPattern>],
        def_module: usize,
    ) -> Result<Vec<Rc<SchemaPattern>>> {
        let mut out: Vec<Rc<SchemaPattern>> = base.to_vec();
        for p in parsed {
            let regex = pattern::compile(&p.pattern)?;
            let exts = self.compile_exts(&p.exts, def_module)?;
            out.push(Rc::new(SchemaPattern {
                source: p.pattern.clone(),
                invert_match: p.invert_match,
                error_message: p.error_message.clone(),
                error_app_tag: p.error_app_tag.clone(),
                description: p.description.clone(),
                reference: p.reference.clone(),
                regex,
                exts,
            }));
        }
        Ok(out)
    }

    fn compile_enums(
        &mut self,
        ty: &ParsedType,
        inherited: &[EnumSpec],
        scope: &ScopeFrame<'_>,
        context_name: &str,
    ) -> Result<Vec<EnumSpec>> {
        if ty.enums.is_empty() {
            return Ok(inherited.to_vec());
        }
        let mut out = Vec::new();
        if inherited.is_empty() {
            // Defining level: labels are new, values auto-assign upward.
            let mut next_value: i64 = 0;
            for e in &ty.enums {
                if !self.if_feature_satisfied(scope.module, &e.if_features)? {
                    continue;
                }
                if out.iter().any(|spec: &EnumSpec| *spec.label == *e.name) {
                    return Err(Error::validation(
                        "duplicate-enum",
                        format!("enum '{}' defined twice in {context_name}", e.name),
                    ));
                }
                let value = match e.value {
                    Some(v) => v,
                    None => next_value,
                };
                if e.value.is_none() && out.iter().any(|s: &EnumSpec| s.value == value) {
                    return Err(Error::validation(
                        "duplicate-enum-value",
                        format!("auto-assigned enum value {value} collides in {context_name}"),
                    ));
                }
                next_value = value.saturating_add(1).max(next_value);
                let exts = self.compile_exts(&e.exts, scope.module)?;
                out.push(EnumSpec {
                    label: self.intern(&e.name),
                    value,
                    status: e.status.unwrap_or_default(),
                    exts,
                });
            }
            if out.is_empty() {
                return Err(Error::validation(
                    "missing-enums",
                    format!("enumeration of {context_name} has no enabled enums"),
                ));
            }
        } else {
            // Restricting level: a subset of the inherited labels; explicit
            // values must repeat the inherited ones.
            for e in &ty.enums {
                if !self.if_feature_satisfied(scope.module, &e.if_features)? {
                    continue;
                }
                let from = inherited
                    .iter()
                    .find(|spec| *spec.label == *e.name)
                    .ok_or_else(|| {
                        Error::validation(
                            "enum-not-in-base",
                            format!(
                                "enum '{}' of {context_name} does not exist in the base type",
                                e.name
                            ),
                        )
                    })?;
                if let Some(v) = e.value {
                    if v != from.value {
                        return Err(Error::validation(
                            "enum-value-mismatch",
                            format!(
                                "enum '{}' of {context_name} changes value {} to {v}",
                                e.name, from.value
                            ),
                        ));
                    }
                }
                let exts = self.compile_exts(&e.exts, scope.module)?;
                out.push(EnumSpec {
                    label: Rc::clone(&from.label),
                    value: from.value,
                    status: e.status.unwrap_or(from.status),
                    exts,
                });
            }
        }
        Ok(out)
    }

    fn compile_bits(
        &mut self,
        ty: &ParsedType,
        inherited: &[BitSpec],
        scope: &ScopeFrame<'_>,
        context_name: &str,
    ) -> Result<Vec<BitSpec>> {
        if ty.bits.is_empty() {
            return Ok(inherited.to_vec());
        }
        let mut out = Vec::new();
        if inherited.is_empty() {
            let mut next_position: u32 = 0;
            for b in &ty.bits {
                if !self.if_feature_satisfied(scope.module, &b.if_features)? {
                    continue;
                }
                if out.iter().any(|spec: &BitSpec| *spec.label == *b.name) {
                    return Err(Error::validation(
                        "duplicate-bit",
                        format!("bit '{}' defined twice in {context_name}", b.name),
                    ));
                }
                let position = match b.position {
                    Some(p) => p,
                    None => next_position,
                };
                if b.position.is_none()
                    && out.iter().any(|s: &BitSpec| s.position == position)
                {
                    return Err(Error::validation(
                        "duplicate-bit-position",
                        format!("auto-assigned bit position {position} collides in {context_name}"),
                    ));
                }
                next_position = next_position.max(position.saturating_add(1));
                let exts = self.compile_exts(&b.exts, scope.module)?;
                out.push(BitSpec {
                    label: self.intern(&b.name),
                    position,
                    status: b.status.unwrap_or_default(),
                    exts,
                });
            }
            if out.is_empty() {
                return Err(Error::validation(
                    "missing-bits",
                    format!("bits type of {context_name} has no enabled bits"),
                ));
            }
        } else {
            for b in &ty.bits {
                if !self.if_feature_satisfied(scope.module, &b.if_features)? {
                    continue;
                }
                let from = inherited
                    .iter()
                    .find(|spec| *spec.label == *b.name)
                    .ok_or_else(|| {
                        Error::validation(
                            "bit-not-in-base",
                            format!(
                                "bit '{}' of {context_name} does not exist in the base type",
                                b.name
                            ),
                        )
                    })?;
                if let Some(p) = b.position {
                    if p != from.position {
                        return Err(Error::validation(
                            "bit-position-mismatch",
                            format!(
                                "bit '{}' of {context_name} changes position {} to {p}",
                                b.name, from.position
                            ),
                        ));
                    }
                }
                let exts = self.compile_exts(&b.exts, scope.module)?;
                out.push(BitSpec {
                    label: Rc::clone(&from.label),
                    position: from.position,
                    status: b.status.unwrap_or(from.status),
                    exts,
                });
            }
        }
        Ok(out)
    }
}

enum ResolvedType<'a> {
    Builtin(TypeKind),
    Typedef(&'a ParsedTypedef, ScopeFrame<'a>),
}

// ============================================================================
// Range and length expressions
// ============================================================================

/// Parse a range expression and intersect it with the inherited spans. Each
/// new span must fit inside a single inherited span; an empty intersection
/// fails compilation.
fn intersect_spans(
    restriction: &ParsedRestriction,
    inherited: &[RangeSpan],
    parse: impl Fn(&str) -> Result<i128>,
    context_name: &str,
) -> Result<Vec<RangeSpan>> {
    let expr = &restriction.expr;
    let mut out: Vec<RangeSpan> = Vec::new();
    for part in expr.split('|') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid_range(expr, context_name));
        }
        let (lo_text, hi_text) = match part.split_once("..") {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => (part, part),
        };
        let lo = match lo_text {
            "min" => inherited.first().map(|s| s.lo).unwrap_or(i128::MIN),
            text => parse(text)?,
        };
        let hi = match hi_text {
            "max" => inherited.last().map(|s| s.hi).unwrap_or(i128::MAX),
            text => parse(text)?,
        };
        if lo > hi {
            return Err(invalid_range(expr, context_name));
        }
        if let Some(prev) = out.last() {
            if lo <= prev.hi {
                return Err(Error::validation(
                    "unordered-range",
                    format!("range parts of '{expr}' must ascend ({context_name})"),
                ));
            }
        }
        // Subset rule: the new span must sit inside one inherited span.
        let within = inherited.iter().any(|s| s.lo <= lo && hi <= s.hi);
        if !within {
            return Err(Error::validation(
                "empty-range-intersection",
                format!(
                    "span {lo}..{hi} of '{expr}' is outside the base type range ({context_name})"
                ),
            ));
        }
        out.push(RangeSpan { lo, hi });
    }
    if out.is_empty() {
        return Err(invalid_range(expr, context_name));
    }
    Ok(out)
}

fn intersect_lengths(
    restriction: &ParsedRestriction,
    inherited: &[LengthSpan],
    context_name: &str,
) -> Result<Vec<LengthSpan>> {
    let as_ranges: Vec<RangeSpan> = inherited
        .iter()
        .map(|l| RangeSpan {
            lo: l.lo as i128,
            hi: l.hi as i128,
        })
        .collect();
    let spans = intersect_spans(
        restriction,
        &as_ranges,
        |s| {
            let v = parse_int_value(s)?;
            if v < 0 {
                return Err(Error::validation(
                    "invalid-length",
                    format!("negative length '{s}'"),
                ));
            }
            Ok(v)
        },
        context_name,
    )?;
    Ok(spans
        .into_iter()
        .map(|s| LengthSpan {
            lo: s.lo as u64,
            hi: s.hi as u64,
        })
        .collect())
}

fn invalid_range(expr: &str, context_name: &str) -> Error {
    Error::validation(
        "invalid-range",
        format!("invalid range expression '{expr}' ({context_name})"),
    )
}

/// Integer literal of a range/length bound or an integer default.
pub(crate) fn parse_int_value(text: &str) -> Result<i128> {
    let text = text.trim();
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16)
    } else if let Some(hex) = text.strip_prefix("-0x") {
        i128::from_str_radix(hex, 16).map(|v| -v)
    } else {
        text.parse::<i128>()
    };
    parsed.map_err(|_| {
        Error::validation("invalid-number", format!("invalid integer value '{text}'"))
    })
}

/// Decimal literal scaled to `10^fraction_digits`.
pub(crate) fn parse_decimal_value(text: &str, fraction_digits: u8) -> Result<i128> {
    let text = text.trim();
    let invalid =
        || Error::validation("invalid-number", format!("invalid decimal value '{text}'"));
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1i128, rest),
        None => (1i128, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if frac_part.len() > fraction_digits as usize {
        return Err(invalid());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    let mut value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    value = value
        .checked_mul(10i128.pow(fraction_digits as u32))
        .ok_or_else(invalid)?;
    if !frac_part.is_empty() {
        let scale = 10i128.pow((fraction_digits as usize - frac_part.len()) as u32);
        let frac: i128 = frac_part.parse().map_err(|_| invalid())?;
        value += frac * scale;
    }
    let value = sign * value;
    if value < i64::MIN as i128 || value > i64::MAX as i128 {
        return Err(invalid());
    }
    Ok(value)
}
