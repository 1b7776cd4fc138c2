//! JavaScript 脚本常量
//!
//! 此模块集中管理所有通过 `execute/sync` 在页面中执行的 JavaScript 脚本，
//! 元素参数统一以 `arguments[0]` 传入。

/// 将元素滚动到视口中央
pub const SCROLL_INTO_VIEW_SCRIPT: &str = "arguments[0].scrollIntoView({block: 'center'});";

/// 元素内部滚动到顶部
pub const ELEMENT_SCROLL_TOP_SCRIPT: &str = "arguments[0].scrollTop = 0;";

/// 元素内部滚动到底部
pub const ELEMENT_SCROLL_BOTTOM_SCRIPT: &str = "arguments[0].scrollTop = arguments[0].scrollHeight;";

/// 窗口滚动到顶部
pub const WINDOW_SCROLL_TOP_SCRIPT: &str = "window.scrollTo(0, 0);";

/// 窗口滚动到底部
pub const WINDOW_SCROLL_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// 元素 XPath 合成脚本
///
/// 沿祖先链向上，按同名兄弟节点计数生成完整的位置路径
pub const XPATH_SCRIPT: &str = r#"
function getElementXPath(element) {
    if (element === document.body) {
        return '/html/body';
    }
    let index = 1;
    let sibling = element.previousElementSibling;
    while (sibling) {
        if (sibling.tagName === element.tagName) {
            index++;
        }
        sibling = sibling.previousElementSibling;
    }
    const tag = element.tagName.toLowerCase();
    return getElementXPath(element.parentNode) + '/' + tag + '[' + index + ']';
}
return getElementXPath(arguments[0]);
"#;

/// 元素属性表脚本
///
/// 返回 `{name: value}` 形式的全部内容属性
pub const ATTRIBUTES_SCRIPT: &str = r#"
const items = {};
for (let index = 0; index < arguments[0].attributes.length; ++index) {
    items[arguments[0].attributes[index].name] = arguments[0].attributes[index].value;
}
return items;
"#;

/// 按像素滚动窗口或元素（正数向下）
pub fn scroll_by_script(amount: i64, on_element: bool) -> String {
    if on_element {
        format!("arguments[0].scrollTop += {};", amount)
    } else {
        format!("window.scrollBy(0, {});", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_by_script() {
        assert_eq!(scroll_by_script(300, true), "arguments[0].scrollTop += 300;");
        assert_eq!(scroll_by_script(-300, false), "window.scrollBy(0, -300);");
    }

    #[test]
    fn test_introspection_scripts_exist() {
        assert!(XPATH_SCRIPT.contains("getElementXPath"));
        assert!(ATTRIBUTES_SCRIPT.contains("attributes.length"));
        assert!(SCROLL_INTO_VIEW_SCRIPT.contains("scrollIntoView"));
    }
}
