use crate::props::PropertySet;
use serde_json::Value;
use taffy::{
    AlignContent, AlignItems, Dimension, Display, FlexDirection, FlexWrap, JustifyContent,
    LengthPercentage, LengthPercentageAuto, Overflow, Point, Position, Rect, Style,
};

/// `"25%"` as a fraction.
fn percent(raw: &str) -> Option<f32> {
    raw.trim()
        .strip_suffix('%')
        .and_then(|n| n.trim().parse::<f32>().ok())
        .map(|p| p / 100.0)
}

fn number(value: &Value) -> Option<f32> {
    value.as_f64().map(|n| n as f32).filter(|n| n.is_finite())
}

fn dimension(value: &Value) -> Option<Dimension> {
    if let Some(n) = number(value) {
        return Some(Dimension::Length(n));
    }
    match value.as_str()? {
        "auto" => Some(Dimension::Auto),
        other => percent(other).map(Dimension::Percent),
    }
}

fn length_auto(value: &Value) -> Option<LengthPercentageAuto> {
    if let Some(n) = number(value) {
        return Some(LengthPercentageAuto::Length(n));
    }
    match value.as_str()? {
        "auto" => Some(LengthPercentageAuto::Auto),
        other => percent(other).map(LengthPercentageAuto::Percent),
    }
}

fn length(value: &Value) -> Option<LengthPercentage> {
    if let Some(n) = number(value) {
        return Some(LengthPercentage::Length(n));
    }
    value
        .as_str()
        .and_then(percent)
        .map(LengthPercentage::Percent)
}

fn flex_direction(raw: &str) -> Option<FlexDirection> {
    Some(match raw {
        "row" => FlexDirection::Row,
        "column" => FlexDirection::Column,
        "row-reverse" => FlexDirection::RowReverse,
        "column-reverse" => FlexDirection::ColumnReverse,
        _ => return None,
    })
}

fn flex_wrap(raw: &str) -> Option<FlexWrap> {
    Some(match raw {
        "nowrap" => FlexWrap::NoWrap,
        "wrap" => FlexWrap::Wrap,
        "wrap-reverse" => FlexWrap::WrapReverse,
        _ => return None,
    })
}

fn justify_content(raw: &str) -> Option<JustifyContent> {
    Some(match raw {
        "flex-start" => JustifyContent::FlexStart,
        "center" => JustifyContent::Center,
        "flex-end" => JustifyContent::FlexEnd,
        "space-between" => JustifyContent::SpaceBetween,
        "space-around" => JustifyContent::SpaceAround,
        "space-evenly" => JustifyContent::SpaceEvenly,
        _ => return None,
    })
}

fn align_items(raw: &str) -> Option<AlignItems> {
    Some(match raw {
        "flex-start" => AlignItems::FlexStart,
        "center" => AlignItems::Center,
        "flex-end" => AlignItems::FlexEnd,
        "stretch" => AlignItems::Stretch,
        "baseline" => AlignItems::Baseline,
        _ => return None,
    })
}

fn align_content(raw: &str) -> Option<AlignContent> {
    Some(match raw {
        "flex-start" => AlignContent::FlexStart,
        "center" => AlignContent::Center,
        "flex-end" => AlignContent::FlexEnd,
        "stretch" => AlignContent::Stretch,
        "space-between" => AlignContent::SpaceBetween,
        "space-around" => AlignContent::SpaceAround,
        "space-evenly" => AlignContent::SpaceEvenly,
        _ => return None,
    })
}

fn overflow(raw: &str) -> Option<Overflow> {
    Some(match raw {
        "visible" => Overflow::Visible,
        "hidden" => Overflow::Hidden,
        "scroll" => Overflow::Scroll,
        _ => return None,
    })
}

/// Resolves `base`, `baseHorizontal`/`baseVertical`, then per-side keys,
/// most specific last.
fn edges<T: Copy>(
    props: &PropertySet,
    base: &str,
    mut rect: Rect<T>,
    convert: fn(&Value) -> Option<T>,
) -> Rect<T> {
    let get = |suffix: &str| props.get(&format!("{base}{suffix}")).and_then(convert);

    if let Some(all) = props.get(base).and_then(convert) {
        rect = Rect {
            left: all,
            right: all,
            top: all,
            bottom: all,
        };
    }
    if let Some(h) = get("Horizontal") {
        rect.left = h;
        rect.right = h;
    }
    if let Some(v) = get("Vertical") {
        rect.top = v;
        rect.bottom = v;
    }
    if let Some(v) = get("Top") {
        rect.top = v;
    }
    if let Some(v) = get("Right") {
        rect.right = v;
    }
    if let Some(v) = get("Bottom") {
        rect.bottom = v;
    }
    if let Some(v) = get("Left") {
        rect.left = v;
    }
    rect
}

/// Builds a flex style from view props. Defaults follow the mobile flexbox
/// convention: column direction and no shrinking.
pub(crate) fn to_style(props: &PropertySet) -> Style {
    let text = |key: &str| props.get_str(key);
    let mut style = Style {
        display: Display::Flex,
        flex_direction: FlexDirection::Column,
        flex_shrink: 0.0,
        ..Default::default()
    };

    if text("display") == Some("none") {
        style.display = Display::None;
    }
    if text("position") == Some("absolute") {
        style.position = Position::Absolute;
    }
    if let Some(dir) = text("flexDirection").and_then(flex_direction) {
        style.flex_direction = dir;
    }
    if let Some(wrap) = text("flexWrap").and_then(flex_wrap) {
        style.flex_wrap = wrap;
    }
    style.justify_content = text("justifyContent").and_then(justify_content);
    style.align_items = text("alignItems").and_then(align_items);
    style.align_self = text("alignSelf").and_then(align_items);
    style.align_content = text("alignContent").and_then(align_content);

    if let Some(flex) = props.get_f32("flex").filter(|f| *f > 0.0) {
        style.flex_grow = flex;
        style.flex_shrink = 1.0;
        style.flex_basis = Dimension::Length(0.0);
    }
    if let Some(grow) = props.get_f32("flexGrow") {
        style.flex_grow = grow.max(0.0);
    }
    if let Some(shrink) = props.get_f32("flexShrink") {
        style.flex_shrink = shrink.max(0.0);
    }
    if let Some(basis) = props.get("flexBasis").and_then(dimension) {
        style.flex_basis = basis;
    }

    let dim = |key: &str| props.get(key).and_then(dimension);
    if let Some(w) = dim("width") {
        style.size.width = w;
    }
    if let Some(h) = dim("height") {
        style.size.height = h;
    }
    if let Some(w) = dim("minWidth") {
        style.min_size.width = w;
    }
    if let Some(h) = dim("minHeight") {
        style.min_size.height = h;
    }
    if let Some(w) = dim("maxWidth") {
        style.max_size.width = w;
    }
    if let Some(h) = dim("maxHeight") {
        style.max_size.height = h;
    }

    style.margin = edges(props, "margin", style.margin, length_auto);
    style.padding = edges(props, "padding", style.padding, length);

    let inset = |key: &str| props.get(key).and_then(length_auto);
    if let Some(v) = inset("left") {
        style.inset.left = v;
    }
    if let Some(v) = inset("top") {
        style.inset.top = v;
    }
    if let Some(v) = inset("right") {
        style.inset.right = v;
    }
    if let Some(v) = inset("bottom") {
        style.inset.bottom = v;
    }

    if let Some(border) = props.get("borderWidth").and_then(length) {
        style.border = Rect {
            left: border,
            right: border,
            top: border,
            bottom: border,
        };
    }
    if let Some(gap) = props.get("gap").and_then(length) {
        style.gap = taffy::Size {
            width: gap,
            height: gap,
        };
    }
    if let Some(o) = text("overflow").and_then(overflow) {
        style.overflow = Point { x: o, y: o };
    }

    style
}
