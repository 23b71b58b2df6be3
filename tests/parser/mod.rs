mod tests_yang;
mod tests_yin;
