//! Anti-Detection Bypass
//!
//! Script text injected into pages before their own scripts run. It
//! defines inert stand-ins for the globals ad libraries create, so a
//! detector probing for them sees "ads loaded" and never fires.
//!
//! Scripts are generated once from [`SPOOFED_OBJECTS`] and then served as
//! `&'static str`.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt::Write;

/// Globals every spoofing script defines
pub const SPOOFED_GLOBALS: &[&str] = &["googletag", "adsbygoogle", "__ads", "fuckAdBlock"];

/// Detector library aliases that share a definition with a primary global
pub const SPOOFED_ALIASES: &[(&str, &str)] = &[("blockAdBlock", "fuckAdBlock")];

/// `(global, definition)` pairs; each definition is a JS expression
const SPOOFED_OBJECTS: &[(&str, &str)] = &[
    (
        "googletag",
        r#"(function () {
    var slot = {
      addService: function () { return slot; },
      setTargeting: function () { return slot; },
      defineSizeMapping: function () { return slot; },
      setCollapseEmptyDiv: function () { return slot; },
      getSlotElementId: function () { return ""; }
    };
    var pubads = {
      enableSingleRequest: function () { return pubads; },
      collapseEmptyDivs: function () { return pubads; },
      setTargeting: function () { return pubads; },
      disableInitialLoad: function () { return pubads; },
      refresh: function () { return pubads; },
      clear: function () { return true; },
      addEventListener: function () { return pubads; },
      getSlots: function () { return []; }
    };
    var cmd = [];
    cmd.push = function () {
      for (var i = 0; i < arguments.length; i++) {
        if (typeof arguments[i] === "function") {
          try { arguments[i](); } catch (e) {}
        }
      }
      return 0;
    };
    return {
      apiReady: true,
      pubadsReady: true,
      cmd: cmd,
      pubads: function () { return pubads; },
      defineSlot: function () { return slot; },
      defineOutOfPageSlot: function () { return slot; },
      enableServices: function () {},
      display: function () {},
      destroySlots: function () { return true; }
    };
  })()"#,
    ),
    (
        "adsbygoogle",
        r#"(function () {
    var ads = [];
    ads.loaded = true;
    ads.push = function () { ads.loaded = true; return 0; };
    return ads;
  })()"#,
    ),
    (
        "__ads",
        r#"{ loaded: true, slots: [], push: function () { return 0; } }"#,
    ),
    (
        "fuckAdBlock",
        r#"(function () {
    var detector = {
      check: function () { return false; },
      emitEvent: function () { return detector; },
      clearEvent: function () { return detector; },
      setOption: function () { return detector; },
      on: function (detected, fn) {
        if (!detected && typeof fn === "function") { try { fn(); } catch (e) {} }
        return detector;
      },
      onDetected: function () { return detector; },
      onNotDetected: function (fn) {
        if (typeof fn === "function") { try { fn(); } catch (e) {} }
        return detector;
      }
    };
    return detector;
  })()"#,
    ),
];

/// Overlay selectors anti-adblock walls commonly use
const OVERLAY_SELECTORS: &[&str] = &[
    "#adblock-notice",
    "#adblock-overlay",
    ".adblock-notice",
    ".adblock-overlay",
    ".adblock-wall",
    ".anti-adblock",
    "[class*='adblock-modal']",
    "[id*='adblock-modal']",
    ".fc-ab-root",
    ".tp-modal",
];

static OBJECT_SPOOFING_SCRIPT: Lazy<String> = Lazy::new(build_object_spoofing_script);

static GENERIC_BYPASS_SCRIPT: Lazy<String> = Lazy::new(build_generic_bypass_script);

/// Script defining every global in [`SPOOFED_GLOBALS`] and its aliases.
///
/// Existing page values are left alone; only missing globals are defined.
pub fn object_spoofing_script() -> &'static str {
    &OBJECT_SPOOFING_SCRIPT
}

/// Spoofing script followed by an overlay remover that also restores
/// page scrolling
pub fn generic_bypass_script() -> &'static str {
    &GENERIC_BYPASS_SCRIPT
}

/// Both scripts, for injection hosts that take them together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BypassScripts {
    pub object_spoofing: &'static str,
    pub generic: &'static str,
}

impl BypassScripts {
    pub fn get() -> Self {
        Self {
            object_spoofing: object_spoofing_script(),
            generic: generic_bypass_script(),
        }
    }
}

impl Default for BypassScripts {
    fn default() -> Self {
        Self::get()
    }
}

fn build_object_spoofing_script() -> String {
    let mut script = String::from("(function () {\n  \"use strict\";\n");

    for (name, definition) in SPOOFED_OBJECTS {
        // writing to a String cannot fail
        let _ = writeln!(script, "  if (typeof window.{name} === \"undefined\") {{");
        let _ = writeln!(script, "    window.{name} = {definition};\n  }}");
    }
    for (alias, target) in SPOOFED_ALIASES {
        let _ = writeln!(script, "  if (typeof window.{alias} === \"undefined\") {{");
        let _ = writeln!(script, "    window.{alias} = window.{target};\n  }}");
    }

    script.push_str("})();\n");
    script
}

fn build_generic_bypass_script() -> String {
    let selectors = OVERLAY_SELECTORS.join(", ");
    let mut script = String::from(object_spoofing_script());
    let _ = write!(
        script,
        r#"(function () {{
  var SELECTORS = "{selectors}";
  function sweep() {{
    var found = document.querySelectorAll(SELECTORS);
    for (var i = 0; i < found.length; i++) {{
      found[i].remove();
    }}
    if (found.length > 0) {{
      document.documentElement.style.overflow = "";
      if (document.body) {{
        document.body.style.overflow = "";
        document.body.style.position = "";
      }}
    }}
  }}
  function start() {{
    sweep();
    new MutationObserver(sweep).observe(document.documentElement, {{
      childList: true,
      subtree: true
    }});
  }}
  if (document.readyState === "loading") {{
    document.addEventListener("DOMContentLoaded", start);
  }} else {{
    start();
  }}
}})();
"#
    );
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_global_is_defined() {
        for script in [object_spoofing_script(), generic_bypass_script()] {
            assert!(!script.contains("var w = "));
            for name in SPOOFED_GLOBALS {
                assert!(script.contains(&format!("window.{}", name)), "{} not defined", name);
                assert!(script.contains(&format!("window.{} = ", name)));
            }
            for (alias, target) in SPOOFED_ALIASES {
                assert!(script.contains(&format!("window.{} = window.{};", alias, target)));
            }
        }
    }

    #[test]
    fn test_table_covers_globals() {
        let names: Vec<&str> = SPOOFED_OBJECTS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, SPOOFED_GLOBALS);
    }

    #[test]
    fn test_script_shape() {
        let script = object_spoofing_script();
        assert!(script.starts_with("(function () {"));
        assert!(script.trim_end().ends_with("})();"));
        assert!(script.contains("pubads"));
        assert!(script.contains("onNotDetected"));

        let opens = script.matches('{').count();
        let closes = script.matches('}').count();
        assert_eq!(opens, closes, "unbalanced braces");
    }

    #[test]
    fn test_generic_script_extends_spoofing() {
        let generic = generic_bypass_script();
        assert!(generic.starts_with(object_spoofing_script()));
        assert!(generic.contains("MutationObserver"));
        assert!(generic.contains(".adblock-overlay"));
        assert_eq!(generic.matches('{').count(), generic.matches('}').count());
    }

    #[test]
    fn test_scripts_are_generated_once() {
        assert!(std::ptr::eq(object_spoofing_script(), object_spoofing_script()));
        assert_eq!(BypassScripts::get().generic, generic_bypass_script());
    }
}
