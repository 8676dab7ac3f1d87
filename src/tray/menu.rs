//! 托盘菜单的纯数据描述，与具体的托盘后端无关。

use crate::network::{NetworkRecord, RouteFlag};

pub const OPEN_ID: &str = "open";
pub const QUIT_ID: &str = "quit";
pub const NETWORKS_ID: &str = "networks";
const TOGGLE_PREFIX: &str = "toggle:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Action { id: String, label: String },
    /// 不可点击的说明项
    Info { label: String },
    Check { id: String, label: String, checked: bool },
    Submenu { id: String, label: String, items: Vec<MenuEntry> },
    Separator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrayMenu {
    pub items: Vec<MenuEntry>,
}

/// 菜单项点击后要执行的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Open,
    Quit,
    Toggle { flag: RouteFlag, network_id: String },
}

impl MenuAction {
    pub fn id(&self) -> String {
        match self {
            MenuAction::Open => OPEN_ID.to_string(),
            MenuAction::Quit => QUIT_ID.to_string(),
            MenuAction::Toggle { flag, network_id } => {
                format!("{TOGGLE_PREFIX}{}:{network_id}", flag.key())
            }
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        match id {
            OPEN_ID => Some(MenuAction::Open),
            QUIT_ID => Some(MenuAction::Quit),
            _ => {
                let rest = id.strip_prefix(TOGGLE_PREFIX)?;
                let (key, network_id) = rest.split_once(':')?;
                if network_id.is_empty() {
                    return None;
                }
                Some(MenuAction::Toggle {
                    flag: RouteFlag::from_key(key)?,
                    network_id: network_id.to_string(),
                })
            }
        }
    }
}

fn network_submenu(network: &NetworkRecord) -> MenuEntry {
    let mut items = vec![
        MenuEntry::Info {
            label: format!("Status: {}", network.status_label()),
        },
        MenuEntry::Info {
            label: format!("ID: {}", network.id),
        },
        MenuEntry::Separator,
    ];
    items.extend(RouteFlag::ALL.into_iter().map(|flag| MenuEntry::Check {
        id: MenuAction::Toggle {
            flag,
            network_id: network.id.clone(),
        }
        .id(),
        label: flag.label().to_string(),
        checked: network.flag(flag),
    }));

    MenuEntry::Submenu {
        id: format!("network:{}", network.id),
        label: network.label(),
        items,
    }
}

/// 根据当前网络列表构建托盘菜单
pub fn build(networks: &[NetworkRecord]) -> TrayMenu {
    let items = vec![
        MenuEntry::Action {
            id: MenuAction::Open.id(),
            label: "Open".to_string(),
        },
        MenuEntry::Submenu {
            id: NETWORKS_ID.to_string(),
            label: "Networks".to_string(),
            items: networks.iter().map(network_submenu).collect(),
        },
        MenuEntry::Separator,
        MenuEntry::Action {
            id: MenuAction::Quit.id(),
            label: "Quit".to_string(),
        },
    ];
    TrayMenu { items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::seed_networks;

    fn networks_submenu(menu: &TrayMenu) -> &[MenuEntry] {
        match &menu.items[1] {
            MenuEntry::Submenu { id, items, .. } if id == NETWORKS_ID => items,
            other => panic!("expected networks submenu, got {other:?}"),
        }
    }

    #[test]
    fn top_level_layout() {
        let menu = build(&seed_networks());
        assert_eq!(menu.items.len(), 4);
        assert!(matches!(&menu.items[0], MenuEntry::Action { label, .. } if label == "Open"));
        assert_eq!(menu.items[2], MenuEntry::Separator);
        assert!(matches!(&menu.items[3], MenuEntry::Action { id, label } if id == QUIT_ID && label == "Quit"));
    }

    #[test]
    fn one_submenu_per_network_in_order() {
        let menu = build(&seed_networks());
        let labels: Vec<_> = networks_submenu(&menu)
            .iter()
            .map(|entry| match entry {
                MenuEntry::Submenu { label, .. } => label.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            labels,
            [
                "Home LAN (8056c2e21c000001)",
                "Lab (c3po1ab123000abc)",
                "Guest (faded12345000002)",
            ]
        );
    }

    #[test]
    fn network_entries_reflect_flags() {
        let menu = build(&seed_networks());
        let MenuEntry::Submenu { items, .. } = &networks_submenu(&menu)[1] else {
            panic!("expected Lab submenu");
        };

        assert_eq!(
            items[..3],
            [
                MenuEntry::Info { label: "Status: Online".into() },
                MenuEntry::Info { label: "ID: c3po1ab123000abc".into() },
                MenuEntry::Separator,
            ]
        );
        assert_eq!(
            items[3..],
            [
                MenuEntry::Check {
                    id: "toggle:allowDefault:c3po1ab123000abc".into(),
                    label: "Allow default route".into(),
                    checked: false,
                },
                MenuEntry::Check {
                    id: "toggle:allowManaged:c3po1ab123000abc".into(),
                    label: "Allow managed routes/DNS".into(),
                    checked: true,
                },
                MenuEntry::Check {
                    id: "toggle:allowGlobal:c3po1ab123000abc".into(),
                    label: "Allow global IPv6".into(),
                    checked: true,
                },
            ]
        );
    }

    #[test]
    fn empty_list_still_has_networks_submenu() {
        let menu = build(&[]);
        assert!(networks_submenu(&menu).is_empty());
    }

    #[test]
    fn parses_menu_ids() {
        assert_eq!(MenuAction::parse("open"), Some(MenuAction::Open));
        assert_eq!(MenuAction::parse("quit"), Some(MenuAction::Quit));
        assert_eq!(
            MenuAction::parse("toggle:allowGlobal:faded12345000002"),
            Some(MenuAction::Toggle {
                flag: RouteFlag::AllowGlobal,
                network_id: "faded12345000002".into(),
            })
        );
        assert_eq!(MenuAction::parse("toggle:allowNothing:faded12345000002"), None);
        assert_eq!(MenuAction::parse("toggle:allowDefault:"), None);
        assert_eq!(MenuAction::parse("network:faded12345000002"), None);
    }

    #[test]
    fn action_ids_parse_back() {
        let toggle = MenuAction::Toggle {
            flag: RouteFlag::AllowManaged,
            network_id: "8056c2e21c000001".into(),
        };
        for action in [MenuAction::Open, MenuAction::Quit, toggle] {
            assert_eq!(MenuAction::parse(&action.id()), Some(action));
        }
    }
}
