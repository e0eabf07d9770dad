//! Concrete class names to logical types.
//!
//! One alias table keyed by (domain, class) and one ancestor walk that
//! asks the engine for superclasses until a known root is reached.

use crate::engine::{Engine, EngineCapabilities, EngineError, ObjectHandle};
use crate::probe::domain_of;
use rekon_common::DomainName::{Flex, Html, Java, Net, Swt, Win, Wpf};
use rekon_common::{DomainName, ValuePattern};
use std::collections::HashSet;

pub const WINDOW: &str = "Window";
pub const MENU_ITEM: &str = "MenuItem";

const MAX_HIERARCHY_DEPTH: usize = 32;

#[rustfmt::skip]
const ALIASES: &[(DomainName, &str, &str)] = &[
    (Java, "javax.swing.JFrame", "Window"),
    (Java, "javax.swing.JDialog", "Window"),
    (Java, "javax.swing.JWindow", "Window"),
    (Java, "java.awt.Frame", "Window"),
    (Java, "java.awt.Dialog", "Window"),
    (Java, "javax.swing.JButton", "Button"),
    (Java, "java.awt.Button", "Button"),
    (Java, "javax.swing.JToggleButton", "Button"),
    (Java, "javax.swing.JCheckBox", "CheckBox"),
    (Java, "javax.swing.JRadioButton", "RadioButton"),
    (Java, "javax.swing.JTextField", "EditBox"),
    (Java, "javax.swing.JPasswordField", "EditBox"),
    (Java, "javax.swing.JTextArea", "EditBox"),
    (Java, "java.awt.TextField", "EditBox"),
    (Java, "javax.swing.JComboBox", "ComboBox"),
    (Java, "javax.swing.JList", "ListBox"),
    (Java, "javax.swing.JLabel", "Label"),
    (Java, "javax.swing.JMenuBar", "MenuBar"),
    (Java, "javax.swing.JMenu", "Menu"),
    (Java, "javax.swing.JMenuItem", "MenuItem"),
    (Java, "javax.swing.JCheckBoxMenuItem", "MenuItem"),
    (Java, "javax.swing.JRadioButtonMenuItem", "MenuItem"),
    (Java, "javax.swing.JPopupMenu", "PopupMenu"),
    (Java, "javax.swing.JTabbedPane", "TabControl"),
    (Java, "javax.swing.JTable", "Table"),
    (Java, "javax.swing.JTree", "Tree"),
    (Java, "javax.swing.JToolBar", "ToolBar"),
    (Java, "javax.swing.JScrollBar", "ScrollBar"),
    (Java, "javax.swing.JPanel", "Panel"),

    (Html, "Html.HtmlBrowser", "Window"),
    (Html, "Html.HtmlDocument", "Window"),
    (Html, "Html.BUTTON", "Button"),
    (Html, "Html.INPUT.submit", "Button"),
    (Html, "Html.INPUT.button", "Button"),
    (Html, "Html.INPUT.text", "EditBox"),
    (Html, "Html.INPUT.password", "EditBox"),
    (Html, "Html.TEXTAREA", "EditBox"),
    (Html, "Html.INPUT.checkbox", "CheckBox"),
    (Html, "Html.INPUT.radio", "RadioButton"),
    (Html, "Html.SELECT", "ComboBox"),
    (Html, "Html.A", "Link"),
    (Html, "Html.IMG", "Image"),
    (Html, "Html.TABLE", "Table"),
    (Html, "Html.LABEL", "Label"),
    (Html, "Html.SPAN", "Label"),
    (Html, "Html.DIV", "Panel"),

    (Net, "System.Windows.Forms.Form", "Window"),
    (Net, "System.Windows.Forms.Button", "Button"),
    (Net, "System.Windows.Forms.CheckBox", "CheckBox"),
    (Net, "System.Windows.Forms.RadioButton", "RadioButton"),
    (Net, "System.Windows.Forms.TextBox", "EditBox"),
    (Net, "System.Windows.Forms.RichTextBox", "EditBox"),
    (Net, "System.Windows.Forms.ComboBox", "ComboBox"),
    (Net, "System.Windows.Forms.ListBox", "ListBox"),
    (Net, "System.Windows.Forms.Label", "Label"),
    (Net, "System.Windows.Forms.MenuStrip", "MenuBar"),
    (Net, "System.Windows.Forms.ToolStripMenuItem", "MenuItem"),
    (Net, "System.Windows.Forms.ContextMenuStrip", "PopupMenu"),
    (Net, "System.Windows.Forms.TabControl", "TabControl"),
    (Net, "System.Windows.Forms.DataGridView", "Table"),
    (Net, "System.Windows.Forms.TreeView", "Tree"),
    (Net, "System.Windows.Forms.ToolStrip", "ToolBar"),
    (Net, "System.Windows.Forms.Panel", "Panel"),

    (Wpf, "System.Windows.Window", "Window"),
    (Wpf, "System.Windows.Controls.Button", "Button"),
    (Wpf, "System.Windows.Controls.CheckBox", "CheckBox"),
    (Wpf, "System.Windows.Controls.RadioButton", "RadioButton"),
    (Wpf, "System.Windows.Controls.TextBox", "EditBox"),
    (Wpf, "System.Windows.Controls.PasswordBox", "EditBox"),
    (Wpf, "System.Windows.Controls.ComboBox", "ComboBox"),
    (Wpf, "System.Windows.Controls.ListBox", "ListBox"),
    (Wpf, "System.Windows.Controls.Label", "Label"),
    (Wpf, "System.Windows.Controls.TextBlock", "Label"),
    (Wpf, "System.Windows.Controls.Menu", "MenuBar"),
    (Wpf, "System.Windows.Controls.MenuItem", "MenuItem"),
    (Wpf, "System.Windows.Controls.ContextMenu", "PopupMenu"),
    (Wpf, "System.Windows.Controls.TabControl", "TabControl"),
    (Wpf, "System.Windows.Controls.DataGrid", "Table"),
    (Wpf, "System.Windows.Controls.TreeView", "Tree"),
    (Wpf, "System.Windows.Controls.ToolBar", "ToolBar"),
    (Wpf, "System.Windows.Controls.Grid", "Panel"),
    (Wpf, "System.Windows.Controls.StackPanel", "Panel"),

    (Win, "#32770", "Window"),
    (Win, "Button", "Button"),
    (Win, "Edit", "EditBox"),
    (Win, "RichEdit20W", "EditBox"),
    (Win, "ComboBox", "ComboBox"),
    (Win, "ListBox", "ListBox"),
    (Win, "Static", "Label"),
    (Win, "#32768", "PopupMenu"),
    (Win, "SysTabControl32", "TabControl"),
    (Win, "SysListView32", "Table"),
    (Win, "SysTreeView32", "Tree"),
    (Win, "ToolbarWindow32", "ToolBar"),

    (Swt, "org.eclipse.swt.widgets.Shell", "Window"),
    (Swt, "org.eclipse.swt.widgets.Button", "Button"),
    (Swt, "org.eclipse.swt.widgets.Text", "EditBox"),
    (Swt, "org.eclipse.swt.widgets.Combo", "ComboBox"),
    (Swt, "org.eclipse.swt.widgets.List", "ListBox"),
    (Swt, "org.eclipse.swt.widgets.Label", "Label"),
    (Swt, "org.eclipse.swt.widgets.Menu", "Menu"),
    (Swt, "org.eclipse.swt.widgets.MenuItem", "MenuItem"),
    (Swt, "org.eclipse.swt.widgets.TabFolder", "TabControl"),
    (Swt, "org.eclipse.swt.widgets.Table", "Table"),
    (Swt, "org.eclipse.swt.widgets.Tree", "Tree"),
    (Swt, "org.eclipse.swt.widgets.ToolBar", "ToolBar"),
    (Swt, "org.eclipse.swt.widgets.Composite", "Panel"),

    (Flex, "mx.core.Application", "Window"),
    (Flex, "mx.containers.TitleWindow", "Window"),
    (Flex, "mx.controls.Button", "Button"),
    (Flex, "mx.controls.CheckBox", "CheckBox"),
    (Flex, "mx.controls.RadioButton", "RadioButton"),
    (Flex, "mx.controls.TextInput", "EditBox"),
    (Flex, "mx.controls.TextArea", "EditBox"),
    (Flex, "mx.controls.ComboBox", "ComboBox"),
    (Flex, "mx.controls.List", "ListBox"),
    (Flex, "mx.controls.Label", "Label"),
    (Flex, "mx.controls.MenuBar", "MenuBar"),
    (Flex, "mx.controls.Menu", "PopupMenu"),
    (Flex, "mx.controls.DataGrid", "Table"),
    (Flex, "mx.controls.Tree", "Tree"),
];

const SYNONYMS: &[(&str, &str)] = &[
    ("PushButton", "Button"),
    ("ToggleButton", "Button"),
    ("Dialog", "Window"),
    ("Frame", "Window"),
    ("Form", "Window"),
    ("Shell", "Window"),
    ("TextField", "EditBox"),
    ("TextBox", "EditBox"),
    ("Edit", "EditBox"),
    ("List", "ListBox"),
    ("Check", "CheckBox"),
    ("Radio", "RadioButton"),
    ("Tab", "TabControl"),
    ("TabbedPane", "TabControl"),
    ("Grid", "Table"),
    ("DataGrid", "Table"),
    ("ContextMenu", "PopupMenu"),
    ("Popup", "PopupMenu"),
    ("StaticText", "Label"),
    ("HyperLink", "Link"),
];

const TYPE_PREFIXES: &[(&str, DomainName)] = &[
    ("Java", Java),
    ("HTML", Html),
    ("Html", Html),
    ("DotNet", Net),
    ("Net", Net),
    ("WPF", Wpf),
    ("Flex", Flex),
    ("SWT", Swt),
];

fn split_type_prefix(type_name: &str) -> (Option<DomainName>, &str) {
    for (prefix, domain) in TYPE_PREFIXES {
        if let Some(rest) = type_name.strip_prefix(prefix) {
            // `Network` is not a NET type; the prefix must end a word.
            if rest.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                return (Some(*domain), rest);
            }
        }
    }
    (None, type_name)
}

/// Domain implied by a prefixed type name such as `JavaButton`.
pub fn domain_for_type(type_name: &str) -> Option<DomainName> {
    split_type_prefix(type_name.trim()).0
}

/// Logical type name without domain prefix or synonym spelling.
pub fn canonical_type(type_name: &str) -> String {
    let (_, base) = split_type_prefix(type_name.trim());
    if let Some((_, canonical)) = SYNONYMS
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(base))
    {
        return (*canonical).to_string();
    }
    ALIASES
        .iter()
        .map(|(_, _, logical)| *logical)
        .chain([WINDOW, MENU_ITEM])
        .find(|logical| logical.eq_ignore_ascii_case(base))
        .unwrap_or(base)
        .to_string()
}

pub fn is_menu_type(type_name: &str) -> bool {
    matches!(
        canonical_type(type_name).as_str(),
        "Menu" | "MenuBar" | "PopupMenu" | "MenuItem"
    )
}

pub fn is_menu_item_type(type_name: &str) -> bool {
    type_name.starts_with(MENU_ITEM) || type_name.ends_with(MENU_ITEM)
}

fn table_domain(domain: DomainName) -> DomainName {
    if domain.is_html_family() { Html } else { domain }
}

/// Alias-table lookup. Without a domain every table is consulted.
pub fn classify(class_name: &str, domain: Option<DomainName>) -> Option<&'static str> {
    let domain = domain.map(table_domain);
    ALIASES
        .iter()
        .find(|(d, class, _)| domain.is_none_or(|want| want == *d) && *class == class_name)
        .map(|(_, _, logical)| *logical)
}

fn roots(domain: DomainName) -> &'static [&'static str] {
    match domain {
        Java | Swt => &["java.lang.Object"],
        Net | Wpf => &["System.Object"],
        _ => &["Object"],
    }
}

/// Ancestors of `class`, nearest first, up to and including a known root.
pub async fn super_types<E: Engine + ?Sized>(
    engine: &E,
    domain: DomainName,
    class: &str,
) -> Result<Vec<String>, EngineError> {
    let roots = roots(domain);
    let mut seen = HashSet::new();
    let mut ancestors = Vec::new();
    let mut current = class.to_string();

    while ancestors.len() < MAX_HIERARCHY_DEPTH {
        if roots.contains(&current.as_str()) {
            break;
        }
        let Some(parent) = engine.superclass(domain, &current).await? else {
            break;
        };
        if !seen.insert(parent.clone()) {
            break;
        }
        ancestors.push(parent.clone());
        current = parent;
    }
    Ok(ancestors)
}

/// Logical type of a live handle.
///
/// Unknown classes are resolved through their ancestors. A top-level
/// handle nothing else claims is a `Window`.
pub async fn logical_type<E: Engine + ?Sized>(
    engine: &E,
    handle: &ObjectHandle,
    top_level: bool,
) -> Result<Option<String>, EngineError> {
    let class = engine.class_name(handle).await?;
    let domain = domain_of(engine, handle).await;

    if let Some(logical) = classify(&class, domain) {
        return Ok(Some(logical.to_string()));
    }
    if let Some(domain) = domain {
        for ancestor in super_types(engine, domain, &class).await? {
            if let Some(logical) = classify(&ancestor, Some(domain)) {
                return Ok(Some(logical.to_string()));
            }
        }
    }
    Ok(top_level.then(|| WINDOW.to_string()))
}

/// Whether `handle` is of logical type `type_name`. Type names compare
/// case-insensitively.
pub async fn is_assignable<E: Engine + ?Sized>(
    engine: &E,
    type_name: &str,
    handle: &ObjectHandle,
    top_level: bool,
) -> Result<bool, EngineError> {
    let want = canonical_type(type_name);
    Ok(logical_type(engine, handle, top_level)
        .await?
        .is_some_and(|found| found.eq_ignore_ascii_case(&want)))
}

/// `Class=` matching: the concrete class, a `.`-qualified suffix of it, or
/// any ancestor.
pub async fn class_matches<E: Engine + ?Sized>(
    engine: &E,
    handle: &ObjectHandle,
    pattern: &ValuePattern,
) -> Result<bool, EngineError> {
    let class = engine.class_name(handle).await?;
    if pattern.matches_exact(&class) {
        return Ok(true);
    }
    if let ValuePattern::Literal(short) = pattern {
        if class.ends_with(&format!(".{}", short)) {
            return Ok(true);
        }
    }
    let Some(domain) = domain_of(engine, handle).await else {
        return Ok(false);
    };
    let ancestors = super_types(engine, domain, &class).await?;
    Ok(ancestors.iter().any(|a| pattern.matches_exact(a)))
}

/// Whether `handle` is the window holding the OS focus. Never fails.
pub async fn is_current_window<E: Engine + ?Sized>(
    engine: &E,
    capabilities: &EngineCapabilities,
    handle: &ObjectHandle,
) -> bool {
    let Ok(Some(foreground)) = engine.foreground_window().await else {
        return false;
    };
    let Ok(Some(native)) = engine.native_window(handle).await else {
        return false;
    };
    if native.pid != foreground.pid {
        return false;
    }

    let domain = domain_of(engine, handle).await;
    if domain.is_some_and(|d| capabilities.unreliable_focus_domains.contains(&d)) {
        return native.hwnd == foreground.hwnd;
    }
    engine.has_focus(handle).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_per_domain() {
        assert_eq!(classify("javax.swing.JButton", Some(Java)), Some("Button"));
        assert_eq!(classify("javax.swing.JButton", Some(Net)), None);
        assert_eq!(classify("Html.A", Some(DomainName::Dojo)), Some("Link"));
        assert_eq!(classify("Edit", None), Some("EditBox"));
        assert_eq!(classify("com.acme.Fancy", Some(Java)), None);
    }

    #[test]
    fn type_prefixes_imply_domains() {
        assert_eq!(domain_for_type("JavaWindow"), Some(Java));
        assert_eq!(domain_for_type("HTMLLink"), Some(Html));
        assert_eq!(domain_for_type("DotNetButton"), Some(Net));
        assert_eq!(domain_for_type("Window"), None);
        assert_eq!(domain_for_type("Network"), None);
    }

    #[test]
    fn canonical_names() {
        assert_eq!(canonical_type("PushButton"), "Button");
        assert_eq!(canonical_type("JavaDialog"), "Window");
        assert_eq!(canonical_type("NetTextBox"), "EditBox");
        assert_eq!(canonical_type("Tree"), "Tree");
        assert_eq!(canonical_type("window"), "Window");
        assert_eq!(canonical_type("BUTTON"), "Button");
        assert_eq!(canonical_type("pushbutton"), "Button");
        assert!(is_menu_type("popupmenu"));
    }

    #[tokio::test]
    async fn assignability_follows_aliases_and_ancestors() {
        let engine = crate::snapshot::SnapshotEngine::from_yaml_str(
            r#"
windows:
  - id: 1
    domain: JAVA
    class: javax.swing.JFrame
    children:
      - { id: 2, class: com.acme.FancyButton }
      - { id: 3, class: com.acme.Widget }
hierarchy:
  com.acme.FancyButton: javax.swing.JButton
"#,
        )
        .unwrap();
        let handle = |id| ObjectHandle::new(id, Some(Java));

        assert!(is_assignable(&engine, "JavaWindow", &handle(1), true).await.unwrap());
        assert!(is_assignable(&engine, "button", &handle(2), false).await.unwrap());
        assert!(is_assignable(&engine, "PushButton", &handle(2), false).await.unwrap());
        assert!(!is_assignable(&engine, "Window", &handle(2), false).await.unwrap());
        assert!(!is_assignable(&engine, "Button", &handle(3), false).await.unwrap());
        assert!(is_assignable(&engine, "Window", &handle(3), true).await.unwrap());
    }

    #[test]
    fn menu_types() {
        assert!(is_menu_type("PopupMenu"));
        assert!(is_menu_type("JavaMenuBar"));
        assert!(!is_menu_type("Button"));
        assert!(is_menu_item_type("MenuItem"));
        assert!(is_menu_item_type("JavaMenuItem"));
        assert!(!is_menu_item_type("Menu"));
    }
}
