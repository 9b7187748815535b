use uuid::Uuid;

use crate::{
    container::{ContainerSet, CueContainer},
    error::BridgeError,
    model::ShowModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Cue(Uuid),
    Container(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberRef {
    List,
    /// 0-based page ordinal.
    Page(usize),
    Selected,
    /// 0-based flat position.
    Position(usize),
}

/// 1-based wire number to 0-based index.
pub fn wire_to_index(token: &str) -> Result<usize, BridgeError> {
    match token.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(BridgeError::Malformed(format!("'{}' is not a cue number", token))),
    }
}

pub fn index_to_wire(index: usize) -> String {
    (index + 1).to_string()
}

pub fn parse_number(token: &str) -> Result<NumberRef, BridgeError> {
    match token {
        "L" => Ok(NumberRef::List),
        "selected" => Ok(NumberRef::Selected),
        _ => match token.strip_prefix('P') {
            Some(page) => wire_to_index(page).map(NumberRef::Page),
            None => wire_to_index(token).map(NumberRef::Position),
        },
    }
}

pub fn resolve_id(
    model: &ShowModel,
    containers: &ContainerSet,
    token: &str,
) -> Result<Resolved, BridgeError> {
    let not_found = || BridgeError::NotFound(format!("cue id '{}'", token));
    let id = Uuid::parse_str(token).map_err(|_| not_found())?;
    if containers.by_id(&id).is_some() {
        return Ok(Resolved::Container(id));
    }
    model.cue(&id).map(|c| Resolved::Cue(c.id)).ok_or_else(not_found)
}

/// Resolves the tokens following `cue/`. Returns the handle and how many
/// tokens it consumed.
pub fn resolve_number(
    model: &ShowModel,
    containers: &ContainerSet,
    tokens: &[&str],
) -> Result<(Resolved, usize), BridgeError> {
    let token = tokens
        .first()
        .ok_or_else(|| BridgeError::Malformed("missing cue number".to_string()))?;
    let not_found = || BridgeError::NotFound(format!("cue number '{}'", token));

    match parse_number(token)? {
        NumberRef::List => containers
            .sequence()
            .map(|s| (Resolved::Container(s.id()), 1))
            .ok_or_else(not_found),
        NumberRef::Page(index) => {
            let page = containers.page(index).ok_or_else(not_found)?;
            match cell_tokens(tokens) {
                Some((row, column)) => {
                    let (row, column) = (wire_to_index(row)?, wire_to_index(column)?);
                    page.cue_at_cell(model, row, column)
                        .map(|id| (Resolved::Cue(id), 3))
                        .ok_or_else(|| {
                            BridgeError::NotFound(format!(
                                "cell {}/{} on {}",
                                row + 1,
                                column + 1,
                                page.token()
                            ))
                        })
                }
                None => Ok((Resolved::Container(page.id()), 1)),
            }
        }
        NumberRef::Selected => containers
            .sequence()
            .and_then(|s| s.standby(model))
            .map(|id| (Resolved::Cue(id), 1))
            .ok_or_else(not_found),
        NumberRef::Position(index) => containers
            .flat_cue_ids(model)
            .get(index)
            .map(|id| (Resolved::Cue(*id), 1))
            .ok_or_else(not_found),
    }
}

/// `P<n>/<row>/<column>`: both following tokens must be numeric.
fn cell_tokens<'a>(tokens: &[&'a str]) -> Option<(&'a str, &'a str)> {
    match tokens {
        [_, row, column, ..]
            if row.bytes().all(|b| b.is_ascii_digit())
                && column.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Some((*row, *column))
        }
        _ => None,
    }
}

/// Wire number of a cue: its 1-based flat position in the active containers.
pub fn number_of(model: &ShowModel, containers: &ContainerSet, cue_id: &Uuid) -> Option<String> {
    containers
        .number_of(model, cue_id)
        .map(|n| index_to_wire(n - 1))
}
